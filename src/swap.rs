//! Swap data model
//!
//! `SwapRequest` is the caller's immutable input. A `Quote` is bound to the exact
//! request tuple it was priced for, and `SwapParameters` is the validated set of
//! arguments for the router's `exactInputSingle`.

use crate::error::{Error, ParameterField, Result};
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniswap V3 pool fee brackets, in hundredths of a basis point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FeeTier {
    /// 0.05%
    Low,
    /// 0.3%
    #[default]
    Medium,
    /// 1%
    High,
}

impl FeeTier {
    pub const ALLOWED: [u32; 3] = [500, 3000, 10000];

    pub fn as_u32(&self) -> u32 {
        match self {
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }
}

impl TryFrom<u32> for FeeTier {
    type Error = Error;

    fn try_from(fee: u32) -> Result<Self> {
        match fee {
            500 => Ok(FeeTier::Low),
            3000 => Ok(FeeTier::Medium),
            10000 => Ok(FeeTier::High),
            other => Err(Error::invalid(
                ParameterField::FeeTier,
                format!("{} is not one of {:?}", other, Self::ALLOWED),
            )),
        }
    }
}

impl From<FeeTier> for u32 {
    fn from(tier: FeeTier) -> Self {
        tier.as_u32()
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// A single-pool exact-input swap instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token_in: Address,
    pub token_out: Address,
    /// Raw pool fee; validated against [`FeeTier::ALLOWED`] before use
    #[serde(default = "default_fee_tier")]
    pub fee_tier: u32,
    /// Input amount in the token's smallest unit
    pub amount_in: U256,
    /// Accepted fractional reduction from the quote, in [0, 1)
    pub slippage_tolerance: f64,
    /// `sqrtPriceLimitX96`; `None` swaps the full input regardless of price
    #[serde(default)]
    pub price_limit: Option<U160>,
    /// Defaults to the signing account
    #[serde(default)]
    pub recipient: Option<Address>,
}

fn default_fee_tier() -> u32 {
    FeeTier::default().as_u32()
}

impl SwapRequest {
    pub fn new(
        token_in: Address,
        token_out: Address,
        fee_tier: u32,
        amount_in: U256,
        slippage_tolerance: f64,
    ) -> Self {
        Self {
            token_in,
            token_out,
            fee_tier,
            amount_in,
            slippage_tolerance,
            price_limit: None,
            recipient: None,
        }
    }

    pub fn with_price_limit(mut self, price_limit: U160) -> Self {
        self.price_limit = Some(price_limit);
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Price limit as sent on-chain (zero means no limit)
    pub fn effective_price_limit(&self) -> U160 {
        self.price_limit.unwrap_or(U160::ZERO)
    }

    /// Fee tier, if it is one of the allowed brackets
    pub fn validated_fee_tier(&self) -> Result<FeeTier> {
        FeeTier::try_from(self.fee_tier)
    }
}

/// Expected output for one exact `(token_in, token_out, fee_tier, amount_in)` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: FeeTier,
    pub amount_in: U256,
    pub price_limit: U160,
    pub expected_amount_out: U256,
    pub quoted_at: DateTime<Utc>,
}

impl Quote {
    /// Whether this quote was computed for the same swap the request describes
    pub fn matches(&self, request: &SwapRequest) -> bool {
        self.token_in == request.token_in
            && self.token_out == request.token_out
            && self.fee_tier.as_u32() == request.fee_tier
            && self.amount_in == request.amount_in
            && self.price_limit == request.effective_price_limit()
    }
}

/// Validated arguments for `exactInputSingle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParameters {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: FeeTier,
    pub recipient: Address,
    /// Unix seconds
    pub deadline: u64,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub price_limit: U160,
    /// Quote the minimum was derived from
    pub expected_amount_out: U256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_fee_tier_accepts_only_known_brackets() {
        assert_eq!(FeeTier::try_from(500).unwrap(), FeeTier::Low);
        assert_eq!(FeeTier::try_from(3000).unwrap(), FeeTier::Medium);
        assert_eq!(FeeTier::try_from(10000).unwrap(), FeeTier::High);

        let err = FeeTier::try_from(100).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameters {
                field: ParameterField::FeeTier,
                ..
            }
        ));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: SwapRequest = serde_json::from_value(serde_json::json!({
            "token_in": "0x6b175474e89094c44da98b954eedeac495271d0f",
            "token_out": "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984",
            "amount_in": "0x2710",
            "slippage_tolerance": 0.005
        }))
        .expect("parse request");

        assert_eq!(request.fee_tier, 3000);
        assert_eq!(request.amount_in, U256::from(10_000u64));
        assert_eq!(request.effective_price_limit(), U160::ZERO);
        assert!(request.recipient.is_none());
    }

    #[test]
    fn test_quote_is_stale_when_amount_changes() {
        let request = SwapRequest::new(
            address!("6b175474e89094c44da98b954eedeac495271d0f"),
            address!("1f9840a85d5af5bf1d1762f925bdaddc4201f984"),
            3000,
            U256::from(10_000u64),
            0.01,
        );
        let quote = Quote {
            token_in: request.token_in,
            token_out: request.token_out,
            fee_tier: FeeTier::Medium,
            amount_in: request.amount_in,
            price_limit: U160::ZERO,
            expected_amount_out: U256::from(42u64),
            quoted_at: Utc::now(),
        };
        assert!(quote.matches(&request));

        let mut bigger = request.clone();
        bigger.amount_in = U256::from(20_000u64);
        assert!(!quote.matches(&bigger));

        let limited = request.with_price_limit(U160::from(1u64));
        assert!(!quote.matches(&limited));
    }
}
