//! Transaction broadcasting
//!
//! Submits a signed swap with `eth_sendRawTransaction` and classifies node
//! rejections. Nothing here retries: a rejected transaction must be rebuilt and
//! re-signed by the caller with a fresh nonce or fee.

use crate::error::BroadcastError;
use crate::rpc::{ChainClient, RpcFailure};
use crate::wallet::SignedTransaction;
use alloy::primitives::TxHash;
use std::sync::Arc;

pub struct Broadcaster {
    client: Arc<dyn ChainClient>,
}

impl Broadcaster {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Submit the transaction; consumes it so the same payload cannot be sent twice
    pub async fn submit(&self, signed: SignedTransaction) -> Result<TxHash, BroadcastError> {
        tracing::info!(
            account = %signed.account(),
            nonce = signed.nonce(),
            tx_hash = %signed.hash(),
            "Broadcasting swap transaction"
        );

        let hash = match self.client.send_raw_transaction(signed.raw()).await {
            Ok(hash) => hash,
            Err(failure) if is_already_known(&failure) => {
                // This exact payload is in the mempool; it counts as sent
                tracing::info!(
                    nonce = signed.nonce(),
                    tx_hash = %signed.hash(),
                    "Node already has this transaction"
                );
                return Ok(signed.hash());
            }
            Err(failure) => {
                let err = classify(&failure);
                tracing::warn!(
                    nonce = signed.nonce(),
                    code = ?failure.code,
                    error = %err,
                    "Broadcast rejected"
                );
                return Err(err);
            }
        };

        if hash != signed.hash() {
            tracing::warn!(
                local = %signed.hash(),
                remote = %hash,
                "Node returned a different transaction hash; using the node's"
            );
        }

        Ok(hash)
    }
}

/// Whether the node reports that it already holds this exact payload
pub fn is_already_known(failure: &RpcFailure) -> bool {
    let message = failure.message.to_lowercase();
    message.contains("already known")
        || message.contains("known transaction")
        || message.contains("already imported")
}

/// Map a node error message onto the broadcast failure taxonomy
///
/// "Already known" replies are not rejections and land in `Other`, which is
/// never retry-safe; `Broadcaster::submit` treats them as accepted.
///
/// Messages differ across clients (geth, erigon, nethermind, reth, hosted
/// providers); matching is on lowercase substrings.
pub fn classify(failure: &RpcFailure) -> BroadcastError {
    let message = failure.message.to_lowercase();
    let detail = failure.message.clone();

    if is_already_known(failure) {
        BroadcastError::Other(detail)
    } else if message.contains("nonce too low")
        || message.contains("nonce has already been used")
        || message.contains("oldnonce")
    {
        BroadcastError::NonceTooLow(detail)
    } else if message.contains("underpriced")
        || message.contains("fee too low")
        || message.contains("max fee per gas less than block base fee")
    {
        BroadcastError::Underpriced(detail)
    } else if message.contains("insufficient funds") {
        BroadcastError::InsufficientFunds(detail)
    } else {
        BroadcastError::Other(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed_swap, MockChain};

    #[tokio::test]
    async fn test_accepted_transaction_returns_hash() {
        let chain = Arc::new(MockChain::new(1).with_nonce(3));
        let tx = signed_swap(3);
        let local = tx.hash();

        let hash = Broadcaster::new(chain.clone()).submit(tx).await.unwrap();
        assert_eq!(hash, local);
        assert!(!hash.is_zero());
        assert_eq!(chain.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reused_nonce_is_nonce_too_low() {
        let chain = Arc::new(MockChain::new(1).with_nonce(3));
        let broadcaster = Broadcaster::new(chain.clone());

        broadcaster.submit(signed_swap(3)).await.unwrap();
        let err = broadcaster.submit(signed_swap(3)).await.unwrap_err();

        assert!(matches!(err, BroadcastError::NonceTooLow(_)));
        assert_eq!(chain.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_already_known_payload_counts_as_sent() {
        for message in ["already known", "Known transaction: 0xab12", "ALREADY_IMPORTED"] {
            let chain = Arc::new(MockChain::new(1).with_send_error(message));
            let tx = signed_swap(4);
            let local = tx.hash();

            let hash = Broadcaster::new(chain).submit(tx).await.unwrap();
            assert_eq!(hash, local, "message: {message}");
        }

        let err = crate::Error::from(classify(&RpcFailure::new("already known")));
        assert!(matches!(err, crate::Error::Broadcast(BroadcastError::Other(_))));
        assert!(!err.safe_to_retry_with_fresh_parameters());
    }

    #[tokio::test]
    async fn test_node_rejections_are_classified() {
        let cases = [
            ("replacement transaction underpriced", "underpriced"),
            ("insufficient funds for gas * price + value", "funds"),
            ("header not found", "other"),
        ];

        for (message, expected) in cases {
            let chain = Arc::new(MockChain::new(1).with_send_error(message));
            let err = Broadcaster::new(chain).submit(signed_swap(0)).await.unwrap_err();
            let kind = match err {
                BroadcastError::NonceTooLow(_) => "nonce",
                BroadcastError::Underpriced(_) => "underpriced",
                BroadcastError::InsufficientFunds(_) => "funds",
                BroadcastError::Other(_) => "other",
            };
            assert_eq!(kind, expected, "message: {message}");
        }
    }

    #[test]
    fn test_classify_covers_client_variants() {
        let cases = [
            ("nonce too low", true),
            ("Nonce too low: next nonce 6, tx nonce 5", true),
            ("already known", false),
            ("OldNonce", true),
            ("transaction underpriced", false),
        ];
        for (message, is_nonce) in cases {
            let err = classify(&RpcFailure::new(message));
            assert_eq!(matches!(err, BroadcastError::NonceTooLow(_)), is_nonce, "{message}");
        }

        assert!(matches!(
            classify(&RpcFailure::new("max fee per gas less than block base fee")),
            BroadcastError::Underpriced(_)
        ));
    }
}
