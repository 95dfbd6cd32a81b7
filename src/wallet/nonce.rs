//! Per-account nonce allocation
//!
//! A `NonceLease` holds the account's async mutex from the moment the nonce is
//! read until the broadcast outcome is known, so two concurrent swaps from one
//! account can never sign with the same nonce.

use crate::rpc::ChainClient;
use crate::{Error, Result};
use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct NonceSlot {
    /// Next nonce this process expects to use, if known
    next: Option<u64>,
}

/// Serializes nonce allocation per signing account
#[derive(Debug, Default)]
pub struct NonceManager {
    accounts: Mutex<HashMap<Address, Arc<AsyncMutex<NonceSlot>>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, account: Address) -> Arc<AsyncMutex<NonceSlot>> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts.entry(account).or_default().clone()
    }

    /// Lock the account and allocate its next nonce
    ///
    /// The nonce is the larger of the chain's pending transaction count and the
    /// locally cached next value, so transactions sent from elsewhere are picked up.
    pub async fn acquire(&self, account: Address, client: &dyn ChainClient) -> Result<NonceLease> {
        let guard = self.slot(account).lock_owned().await;

        let on_chain = client.pending_nonce(account).await.map_err(|e| {
            Error::SigningFailed(format!("could not read nonce for {}: {}", account, e))
        })?;
        let nonce = guard.next.map_or(on_chain, |cached| cached.max(on_chain));

        tracing::debug!(%account, nonce, on_chain, cached = ?guard.next, "Leased nonce");

        Ok(NonceLease {
            account,
            nonce,
            guard,
            settled: false,
        })
    }
}

/// Exclusive right to sign with one nonce for one account
///
/// Call `commit` once the network accepted the transaction. Dropping the lease
/// any other way forgets the cached value so the next lease re-reads the chain.
pub struct NonceLease {
    account: Address,
    nonce: u64,
    guard: OwnedMutexGuard<NonceSlot>,
    settled: bool,
}

impl NonceLease {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The transaction was accepted; the next lease uses `nonce + 1`
    pub fn commit(mut self) {
        self.guard.next = Some(self.nonce + 1);
        self.settled = true;
    }

    /// The transaction was not accepted; resync from the chain next time
    pub fn release(mut self) {
        self.guard.next = None;
        self.settled = true;
    }
}

impl Drop for NonceLease {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.next = None;
        }
    }
}

impl std::fmt::Debug for NonceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceLease")
            .field("account", &self.account)
            .field("nonce", &self.nonce)
            .finish()
    }
}
