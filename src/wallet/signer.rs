//! Swap transaction signing
//!
//! SECURITY: This is the ONLY place where private keys are materialized.
//! - The key is fetched from the `CredentialProvider` once per `sign` call
//! - The `PrivateKeySigner` lives on this call's stack frame and is dropped on return
//! - Keys are never logged

use crate::contracts::ISwapRouter;
use crate::swap::SwapParameters;
use crate::wallet::credentials::{parse_signer, CredentialProvider};
use crate::{Error, Result};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

/// Gas and fee settings for the swap transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GasConfig {
    /// Pre-London pricing (EIP-155 replay protected)
    Legacy {
        gas_limit: u64,
        #[serde(with = "wei")]
        gas_price: u128,
    },
    /// EIP-1559 dynamic fee
    Eip1559 {
        gas_limit: u64,
        #[serde(with = "wei")]
        max_fee_per_gas: u128,
        #[serde(with = "wei")]
        max_priority_fee_per_gas: u128,
    },
}

/// Wei amounts in config files
///
/// Internally tagged enums buffer their fields, and the buffer has no `u128`
/// variant, so fees go through `u64` numbers or decimal strings instead.
mod wei {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*value) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(WeiVisitor)
    }

    struct WeiVisitor;

    impl<'de> Visitor<'de> for WeiVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative wei amount as an integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v.into())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative wei amount: {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid wei amount: {}", v)))
        }
    }
}

impl GasConfig {
    pub fn gas_limit(&self) -> u64 {
        match self {
            GasConfig::Legacy { gas_limit, .. } | GasConfig::Eip1559 { gas_limit, .. } => {
                *gas_limit
            }
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self::Legacy {
            gas_limit: 4_300_000,
            gas_price: 4_200_000_000, // 4.2 gwei
        }
    }
}

/// A signed, EIP-2718 encoded transaction bound to one `(account, nonce)` pair
///
/// Deliberately not `Clone`: `Broadcaster::submit` consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    account: Address,
    nonce: u64,
    hash: TxHash,
    raw: Bytes,
}

impl SignedTransaction {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Hash computed locally from the signed payload
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

/// ABI-encode `exactInputSingle` for the given parameters
pub fn encode_swap_call(params: &SwapParameters) -> Result<Bytes> {
    let call = ISwapRouter::exactInputSingleCall {
        params: ISwapRouter::ExactInputSingleParams {
            tokenIn: params.token_in,
            tokenOut: params.token_out,
            fee: params
                .fee_tier
                .as_u32()
                .try_into()
                .map_err(|_| {
                    Error::SigningFailed(format!("fee {} does not fit uint24", params.fee_tier))
                })?,
            recipient: params.recipient,
            deadline: U256::from(params.deadline),
            amountIn: params.amount_in,
            amountOutMinimum: params.amount_out_minimum,
            sqrtPriceLimitX96: params.price_limit,
        },
    };

    Ok(Bytes::from(call.abi_encode()))
}

/// Encodes and signs router swaps for one chain
#[derive(Debug, Clone)]
pub struct TransactionSigner {
    chain_id: u64,
    router: Address,
}

impl TransactionSigner {
    pub fn new(chain_id: u64, router: Address) -> Self {
        Self { chain_id, router }
    }

    pub fn router(&self) -> Address {
        self.router
    }

    /// Sign an `exactInputSingle` call with the account's key
    ///
    /// Deterministic for fixed inputs (RFC 6979 nonces).
    pub fn sign(
        &self,
        params: &SwapParameters,
        nonce: u64,
        gas: &GasConfig,
        account: &dyn CredentialProvider,
    ) -> Result<SignedTransaction> {
        let input = encode_swap_call(params)?;

        let key = account.signing_key()?;
        let signer = parse_signer(&key)?;
        drop(key);

        if signer.address() != account.address() {
            return Err(Error::SigningFailed(format!(
                "credential does not belong to account {}",
                account.address()
            )));
        }

        let envelope: TxEnvelope = match *gas {
            GasConfig::Legacy {
                gas_limit,
                gas_price,
            } => {
                let mut tx = TxLegacy {
                    chain_id: Some(self.chain_id),
                    nonce,
                    gas_price,
                    gas_limit,
                    to: TxKind::Call(self.router),
                    value: U256::ZERO,
                    input,
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| Error::SigningFailed(e.to_string()))?;
                tx.into_signed(signature).into()
            }
            GasConfig::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = TxEip1559 {
                    chain_id: self.chain_id,
                    nonce,
                    gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to: TxKind::Call(self.router),
                    value: U256::ZERO,
                    access_list: Default::default(),
                    input,
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| Error::SigningFailed(e.to_string()))?;
                tx.into_signed(signature).into()
            }
        };

        let hash = *envelope.tx_hash();
        let raw = Bytes::from(envelope.encoded_2718());

        tracing::debug!(
            account = %account.address(),
            nonce,
            tx_hash = %hash,
            gas_limit = gas.gas_limit(),
            "Signed swap transaction"
        );

        Ok(SignedTransaction {
            account: account.address(),
            nonce,
            hash,
            raw,
        })
    }
}
