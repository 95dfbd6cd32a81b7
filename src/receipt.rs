//! Receipt resolution
//!
//! Polls for block inclusion of a broadcast transaction. The timeout bounds how
//! long the caller waits, not the transaction's life: `TimedOut` means the
//! outcome is unknown and the transaction may still be mined.

use crate::error::{Error, Result};
use crate::rpc::{ChainClient, MinedReceipt};
use alloy::primitives::TxHash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Time allowed for a single receipt lookup once the wait budget is spent
const MIN_LOOKUP_WINDOW: Duration = Duration::from_millis(500);

/// Terminal outcome of waiting for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Receipt {
    Confirmed(MinedReceipt),
    Reverted(MinedReceipt),
    TimedOut { transaction_id: TxHash },
}

impl Receipt {
    pub fn transaction_id(&self) -> TxHash {
        match self {
            Receipt::Confirmed(r) | Receipt::Reverted(r) => r.transaction_id,
            Receipt::TimedOut { transaction_id } => *transaction_id,
        }
    }

    pub fn mined(&self) -> Option<&MinedReceipt> {
        match self {
            Receipt::Confirmed(r) | Receipt::Reverted(r) => Some(r),
            Receipt::TimedOut { .. } => None,
        }
    }
}

pub struct ReceiptResolver {
    client: Arc<dyn ChainClient>,
    poll_interval: Duration,
}

impl ReceiptResolver {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait up to `timeout` for the transaction to be mined
    ///
    /// Checks at least once, so a zero timeout returns `TimedOut` right after
    /// the first miss. Each lookup is itself bounded by the remaining budget
    /// (at least `MIN_LOOKUP_WINDOW`), so a stalled node cannot hold the caller.
    /// Resolves exactly once.
    pub async fn await_receipt(
        &self,
        transaction_id: TxHash,
        timeout: Duration,
    ) -> Result<Receipt> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            let window = timeout
                .saturating_sub(started.elapsed())
                .max(MIN_LOOKUP_WINDOW);
            let lookup = self.client.transaction_receipt(transaction_id);
            let found = match tokio::time::timeout(window, lookup).await {
                Ok(result) => result.map_err(|e| Error::ReceiptUnavailable {
                    transaction_id,
                    reason: e.to_string(),
                })?,
                Err(_) => {
                    tracing::warn!(
                        tx_hash = %transaction_id,
                        waited_ms = started.elapsed().as_millis() as u64,
                        polls,
                        "Receipt lookup stalled past timeout; transaction may still be mined"
                    );
                    return Ok(Receipt::TimedOut { transaction_id });
                }
            };

            if let Some(mined) = found {
                tracing::info!(
                    tx_hash = %transaction_id,
                    block = mined.block_number,
                    gas_used = mined.gas_used,
                    success = mined.success,
                    polls,
                    "Transaction mined"
                );
                return Ok(if mined.success {
                    Receipt::Confirmed(mined)
                } else {
                    Receipt::Reverted(mined)
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                tracing::warn!(
                    tx_hash = %transaction_id,
                    waited_ms = elapsed.as_millis() as u64,
                    polls,
                    "No receipt before timeout; transaction may still be mined"
                );
                return Ok(Receipt::TimedOut { transaction_id });
            }

            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}
