//! Quote service
//!
//! Prices a prospective swap with `eth_call` against the Uniswap V3 Quoter.
//! Read-only: nothing is signed and no gas is spent.

use crate::contracts::IQuoter;
use crate::error::{Error, ParameterField, Result};
use crate::rpc::ChainClient;
use crate::swap::{FeeTier, Quote};
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use chrono::Utc;
use std::sync::Arc;

pub struct QuoteService {
    client: Arc<dyn ChainClient>,
    quoter: Address,
}

impl QuoteService {
    pub fn new(client: Arc<dyn ChainClient>, quoter: Address) -> Self {
        Self { client, quoter }
    }

    /// Quote an exact-input single-pool swap
    ///
    /// Fails with `InvalidParameters` before any network call when `amount_in` is
    /// zero or the fee is not an allowed tier, and with `QuoteFailed` on any
    /// node or decoding error. Never retries.
    pub async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        fee_tier: u32,
        amount_in: U256,
        price_limit: U160,
    ) -> Result<Quote> {
        if amount_in.is_zero() {
            return Err(Error::invalid(
                ParameterField::AmountIn,
                "must be greater than zero",
            ));
        }
        let fee_tier = FeeTier::try_from(fee_tier)?;

        let call = IQuoter::quoteExactInputSingleCall {
            tokenIn: token_in,
            tokenOut: token_out,
            fee: fee_tier
                .as_u32()
                .try_into()
                .map_err(|_| Error::invalid(ParameterField::FeeTier, "does not fit uint24"))?,
            amountIn: amount_in,
            sqrtPriceLimitX96: price_limit,
        };

        let output = self
            .client
            .call(None, self.quoter, Bytes::from(call.abi_encode()))
            .await
            .map_err(|e| Error::QuoteFailed(format!("quoter call failed: {}", e)))?;

        let expected_amount_out = IQuoter::quoteExactInputSingleCall::abi_decode_returns(&output)
            .map_err(|e| Error::QuoteFailed(format!("undecodable quoter response: {}", e)))?;

        tracing::debug!(
            %token_in,
            %token_out,
            fee = %fee_tier,
            %amount_in,
            %expected_amount_out,
            "Received quote"
        );

        Ok(Quote {
            token_in,
            token_out,
            fee_tier,
            amount_in,
            price_limit,
            expected_amount_out,
            quoted_at: Utc::now(),
        })
    }
}
