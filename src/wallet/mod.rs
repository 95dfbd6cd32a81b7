//! Account credentials, nonce allocation and transaction signing
//!
//! Private keys never leave this module and are never logged.

mod credentials;
mod nonce;
mod signer;

pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use nonce::{NonceLease, NonceManager};
pub use signer::{encode_swap_call, GasConfig, SignedTransaction, TransactionSigner};
