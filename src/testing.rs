//! In-memory doubles for the network-facing traits

use crate::rpc::{ChainClient, MinedReceipt, RpcFailure};
use crate::swap::{FeeTier, SwapParameters};
use crate::tokens::addresses;
use crate::wallet::{
    CredentialProvider, GasConfig, SignedTransaction, StaticCredentials, TransactionSigner,
};
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::aliases::U160;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Anvil's first dev account; never funded outside local chains
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

pub fn test_credentials() -> StaticCredentials {
    StaticCredentials::from_hex(TEST_KEY).expect("valid test key")
}

/// 10_000 DAI-wei into UNI on the 0.3% pool, paid to the test account
pub fn sample_parameters() -> SwapParameters {
    SwapParameters {
        token_in: addresses::DAI_ETH,
        token_out: addresses::UNI_ETH,
        fee_tier: FeeTier::Medium,
        recipient: test_credentials().address(),
        deadline: 1_700_000_900,
        amount_in: U256::from(10_000u64),
        amount_out_minimum: U256::from(8_910u64),
        price_limit: U160::ZERO,
        expected_amount_out: U256::from(9_000u64),
    }
}

pub fn signed_swap(nonce: u64) -> SignedTransaction {
    TransactionSigner::new(1, addresses::UNISWAP_V3_ROUTER)
        .sign(
            &sample_parameters(),
            nonce,
            &GasConfig::default(),
            &test_credentials(),
        )
        .expect("sign sample swap")
}

/// Scripted node: answers quotes, tracks one account's nonce, mines on demand
pub struct MockChain {
    chain_id: u64,
    call_result: Mutex<Result<Bytes, RpcFailure>>,
    next_nonce: Mutex<u64>,
    send_override: Mutex<Option<RpcFailure>>,
    /// Receipt lookups before a broadcast transaction is reported mined;
    /// `None` never mines
    mine_after: Mutex<Option<usize>>,
    revert_on_mine: Mutex<bool>,
    receipt_polls: Mutex<HashMap<TxHash, usize>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub calls: Mutex<Vec<(Option<Address>, Address, Bytes)>>,
    pub nonce_reads: Mutex<usize>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            call_result: Mutex::new(Err(RpcFailure::new("no call result scripted"))),
            next_nonce: Mutex::new(0),
            send_override: Mutex::new(None),
            mine_after: Mutex::new(Some(0)),
            revert_on_mine: Mutex::new(false),
            receipt_polls: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            nonce_reads: Mutex::new(0),
        }
    }

    /// Answer every `eth_call` with an ABI-encoded uint256
    pub fn with_quote(self, amount_out: U256) -> Self {
        *self.call_result.lock().unwrap() = Ok(Bytes::from(amount_out.abi_encode()));
        self
    }

    pub fn with_call_result(self, result: Result<Bytes, RpcFailure>) -> Self {
        *self.call_result.lock().unwrap() = result;
        self
    }

    pub fn with_nonce(self, nonce: u64) -> Self {
        *self.next_nonce.lock().unwrap() = nonce;
        self
    }

    pub fn with_send_error(self, message: &str) -> Self {
        *self.send_override.lock().unwrap() = Some(RpcFailure {
            code: Some(-32000),
            message: message.to_string(),
            data: None,
        });
        self
    }

    pub fn never_mines(self) -> Self {
        *self.mine_after.lock().unwrap() = None;
        self
    }

    pub fn mines_after(self, polls: usize) -> Self {
        *self.mine_after.lock().unwrap() = Some(polls);
        self
    }

    pub fn reverts(self) -> Self {
        *self.revert_on_mine.lock().unwrap() = true;
        self
    }

    /// Simulate a transaction from the same account landing outside this process
    pub fn bump_nonce(&self) {
        *self.next_nonce.lock().unwrap() += 1;
    }

    pub fn decode_sent(&self, index: usize) -> TxEnvelope {
        let sent = self.sent.lock().unwrap();
        TxEnvelope::decode_2718(&mut sent[index].as_ref()).expect("valid envelope")
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.chain_id)
    }

    async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, RpcFailure> {
        self.calls.lock().unwrap().push((from, to, data));
        self.call_result.lock().unwrap().clone()
    }

    async fn estimate_gas(&self, _: Address, _: Address, _: Bytes) -> Result<u64, RpcFailure> {
        Ok(150_000)
    }

    async fn pending_nonce(&self, _account: Address) -> Result<u64, RpcFailure> {
        *self.nonce_reads.lock().unwrap() += 1;
        Ok(*self.next_nonce.lock().unwrap())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure> {
        if let Some(failure) = self.send_override.lock().unwrap().clone() {
            return Err(failure);
        }

        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| RpcFailure::new(format!("rlp: {}", e)))?;
        let mut next = self.next_nonce.lock().unwrap();
        if envelope.nonce() < *next {
            return Err(RpcFailure {
                code: Some(-32000),
                message: format!(
                    "nonce too low: next nonce {}, tx nonce {}",
                    *next,
                    envelope.nonce()
                ),
                data: None,
            });
        }
        *next = envelope.nonce() + 1;

        self.sent.lock().unwrap().push(Bytes::copy_from_slice(raw));
        Ok(keccak256(raw))
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<MinedReceipt>, RpcFailure> {
        let mut polls = self.receipt_polls.lock().unwrap();
        let seen = polls.entry(hash).or_insert(0);
        let ready = match *self.mine_after.lock().unwrap() {
            Some(after) => *seen >= after,
            None => false,
        };
        *seen += 1;

        let known = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .any(|raw| keccak256(raw) == hash);

        if !(ready && known) {
            return Ok(None);
        }

        Ok(Some(MinedReceipt {
            transaction_id: hash,
            block_number: 19_000_000,
            block_hash: B256::repeat_byte(0xbb),
            gas_used: 127_000,
            success: !*self.revert_on_mine.lock().unwrap(),
        }))
    }
}
