//! Uniswap V3 swap executor
//!
//! Executes one exact-input, single-pool swap as a strict pipeline:
//! - Quote the expected output with the V3 Quoter (`eth_call`)
//! - Derive the minimum output and deadline from that quote
//! - Sign `exactInputSingle` for the router with a leased nonce
//! - Broadcast and wait, bounded, for the receipt
//!
//! # Security Model
//!
//! - Private keys are read per signing call and never leave `wallet::signer`
//! - Keys and RPC API keys never reach logs or the audit trail
//! - A timed-out confirmation is "unknown", never "failed"; callers must not
//!   resubmit the same payload

pub mod audit;
pub mod broadcast;
pub mod config;
pub mod contracts;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod quote;
pub mod receipt;
pub mod rpc;
pub mod simulator;
pub mod swap;
pub mod tokens;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{Config, Network, RpcConfig};
pub use error::{BroadcastError, Error, Result, Stage};
pub use pipeline::{ExecutionContext, PipelineSettings, PipelineState, SwapPipeline};
pub use receipt::Receipt;
pub use swap::{FeeTier, Quote, SwapParameters, SwapRequest};
