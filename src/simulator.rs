//! Preflight simulation
//!
//! Runs the swap calldata through `eth_call` from the swapping account before
//! anything is signed, so a swap that would revert fails without spending gas.
//! Read-only: never signs or submits.

use crate::rpc::{ChainClient, RpcFailure};
use alloy::hex;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{decode_revert_reason, Revert, SolError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The simulation could not be run at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// Transport or node failure unrelated to the call's outcome
    #[error("Network error: {0}")]
    Network(String),
}

/// Result of simulating a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub success: bool,
    /// Gas estimate; absent when the call reverted or estimation failed
    pub gas_used: Option<u64>,
    pub revert_reason: Option<String>,
    pub return_data: Option<Bytes>,
}

impl SimulationResult {
    pub fn success(gas_used: Option<u64>, return_data: Bytes) -> Self {
        Self {
            success: true,
            gas_used,
            revert_reason: None,
            return_data: Some(return_data),
        }
    }

    pub fn failed(reason: String) -> Self {
        Self {
            success: false,
            gas_used: None,
            revert_reason: Some(reason),
            return_data: None,
        }
    }
}

pub struct TransactionSimulator {
    client: Arc<dyn ChainClient>,
}

impl TransactionSimulator {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Simulate a call from `from` to `to`
    ///
    /// A revert is a failed result; the caller decides whether it aborts the
    /// swap. Failures that say nothing about the call (connection refused, 5xx,
    /// rate limits) are `SimulationError::Network`.
    pub async fn simulate(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<SimulationResult, SimulationError> {
        match self.client.call(Some(from), to, data.clone()).await {
            Ok(output) => {
                let gas_used = match self.client.estimate_gas(from, to, data).await {
                    Ok(gas) => Some(gas),
                    Err(e) => {
                        tracing::debug!(error = %e, "Gas estimation failed after successful call");
                        None
                    }
                };
                tracing::debug!(%from, %to, ?gas_used, "Simulation succeeded");
                Ok(SimulationResult::success(gas_used, output))
            }
            Err(failure) if is_revert(&failure) => {
                let reason = parse_revert_reason(&failure);
                tracing::debug!(%from, %to, %reason, "Simulation reverted");
                Ok(SimulationResult::failed(reason))
            }
            Err(failure) => {
                tracing::warn!(%from, %to, error = %failure, "Simulation could not reach the node");
                Err(SimulationError::Network(failure.message))
            }
        }
    }
}

/// Whether a failed call reports the call's own revert
///
/// Code 3 and attached data come from the EVM; otherwise the message must say so.
pub fn is_revert(failure: &RpcFailure) -> bool {
    failure.code == Some(3)
        || failure.data.is_some()
        || failure.message.to_lowercase().contains("revert")
}

/// Best-effort human-readable revert reason from a node error
///
/// Prefers ABI-encoded revert data when the node returned it, then falls back
/// to the text forms clients put in the message.
pub fn parse_revert_reason(failure: &RpcFailure) -> String {
    if let Some(data) = failure.data.as_deref() {
        let trimmed = data.trim_matches('"');
        if let Ok(bytes) = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed)) {
            if !bytes.is_empty() {
                // Error(string)
                if let Ok(revert) = Revert::abi_decode(&bytes) {
                    return revert.reason;
                }
                // Panic(uint256) and plain UTF-8 payloads
                if let Some(reason) = decode_revert_reason(&bytes) {
                    return reason;
                }
                return format!("Reverted with data: {}", trimmed);
            }
        }
    }

    let message = failure.message.as_str();
    if !message.contains("execution reverted") {
        return message.to_string();
    }

    // geth: "execution reverted: Too little received"
    // hardhat-style: "...revert: Too little received\""
    if let Some(start) = message.find("revert: ") {
        let reason = &message[start + "revert: ".len()..];
        return reason.split('"').next().unwrap_or(reason).to_string();
    }
    if let Some(reason) = message.strip_prefix("execution reverted: ") {
        if !reason.is_empty() {
            return reason.to_string();
        }
    }

    "execution reverted".to_string()
}
