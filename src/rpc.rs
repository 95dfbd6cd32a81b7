//! Narrow JSON-RPC seam used by every network-facing stage
//!
//! The pipeline only needs a handful of calls from a node. They are expressed as a trait
//! so the quote endpoint and the execution endpoint can be configured
//! independently and replaced in tests.

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure returned by a node or by the transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RpcFailure {
    /// JSON-RPC error code, when the node answered with an error object
    pub code: Option<i64>,
    pub message: String,
    /// Revert data attached to the error object, if any
    pub data: Option<String>,
}

impl RpcFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }
}

impl From<TransportError> for RpcFailure {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self {
                code: Some(payload.code),
                message: payload.message.to_string(),
                data: payload.data.as_ref().map(|d| d.get().to_string()),
            },
            None => Self::new(err.to_string()),
        }
    }
}

/// Block inclusion of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedReceipt {
    pub transaction_id: TxHash,
    pub block_number: u64,
    pub block_hash: B256,
    pub gas_used: u64,
    /// `false` when the transaction reverted
    pub success: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain ID reported by the endpoint
    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    /// `eth_call` against the latest block
    async fn call(&self, from: Option<Address>, to: Address, data: Bytes)
        -> Result<Bytes, RpcFailure>;

    /// `eth_estimateGas` for the same call
    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes)
        -> Result<u64, RpcFailure>;

    /// Transaction count including the pending pool
    async fn pending_nonce(&self, account: Address) -> Result<u64, RpcFailure>;

    /// `eth_sendRawTransaction`
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure>;

    /// `None` until the transaction is included in a block
    async fn transaction_receipt(&self, hash: TxHash)
        -> Result<Option<MinedReceipt>, RpcFailure>;
}

/// `ChainClient` backed by an alloy HTTP provider
#[derive(Clone)]
pub struct ProviderClient {
    provider: DynProvider,
    url: url::Url,
}

impl ProviderClient {
    pub fn connect(rpc_url: &str) -> Result<Self, RpcFailure> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| RpcFailure::new(format!("Invalid RPC URL: {}", e)))?;

        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();

        Ok(Self { provider, url })
    }

    /// Host portion of the endpoint; API keys in paths are not exposed
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("unknown")
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("host", &self.host())
            .finish()
    }
}

#[async_trait]
impl ChainClient for ProviderClient {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, RpcFailure> {
        let mut tx = TransactionRequest::default()
            .to(to)
            .input(data.into())
            .value(U256::ZERO);
        if let Some(from) = from {
            tx = tx.from(from);
        }

        Ok(self.provider.call(tx).await?)
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<u64, RpcFailure> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(to)
            .input(data.into());

        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_transaction_count(account).pending().await?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<MinedReceipt>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;

        Ok(receipt.and_then(|r| {
            // Pending-block receipts from some nodes lack a block reference
            let block_number = r.block_number?;
            let block_hash = r.block_hash?;
            Some(MinedReceipt {
                transaction_id: r.transaction_hash,
                block_number,
                block_hash,
                gas_used: r.gas_used,
                success: ReceiptResponse::status(&r),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_invalid_url() {
        let err = ProviderClient::connect("not a url").unwrap_err();
        assert!(err.message.contains("Invalid RPC URL"));
    }

    #[test]
    fn test_debug_shows_host_only() {
        let client =
            ProviderClient::connect("https://eth-mainnet.g.alchemy.com/v2/SECRET_KEY").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("eth-mainnet.g.alchemy.com"));
        assert!(!debug.contains("SECRET_KEY"));
    }
}
