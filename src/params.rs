//! Parameter building
//!
//! Pure derivation of `exactInputSingle` arguments from a request and its quote.
//! No I/O; identical inputs and `now` give identical output.

use crate::error::{Error, ParameterField, Result};
use crate::swap::{Quote, SwapParameters, SwapRequest};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default time a swap stays executable after parameters are built
pub const DEFAULT_DEADLINE_WINDOW: Duration = Duration::from_secs(900);

/// Resolution of slippage tolerances: 1e-9
const SLIPPAGE_SCALE: u64 = 1_000_000_000;

/// Builds validated swap parameters
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    deadline_window: Duration,
    default_recipient: Option<Address>,
}

impl Default for ParameterBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE_WINDOW)
    }
}

impl ParameterBuilder {
    pub fn new(deadline_window: Duration) -> Self {
        Self {
            deadline_window,
            default_recipient: None,
        }
    }

    /// Recipient used when the request does not name one
    pub fn with_default_recipient(mut self, recipient: Address) -> Self {
        self.default_recipient = Some(recipient);
        self
    }

    pub fn build(
        &self,
        request: &SwapRequest,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Result<SwapParameters> {
        if request.amount_in.is_zero() {
            return Err(Error::invalid(
                ParameterField::AmountIn,
                "must be greater than zero",
            ));
        }
        let slippage_units = slippage_units(request.slippage_tolerance)?;
        let fee_tier = request.validated_fee_tier()?;

        if request.token_in == request.token_out {
            return Err(Error::invalid(
                ParameterField::TokenOut,
                "must differ from token_in",
            ));
        }
        if !quote.matches(request) {
            return Err(Error::invalid(
                ParameterField::Quote,
                "quote was computed for a different swap",
            ));
        }
        if quote.expected_amount_out.is_zero() {
            return Err(Error::invalid(
                ParameterField::Quote,
                "quoted output is zero",
            ));
        }

        let recipient = request
            .recipient
            .or(self.default_recipient)
            .ok_or_else(|| Error::invalid(ParameterField::Recipient, "no recipient configured"))?;

        let deadline = self.deadline(now)?;
        let amount_out_minimum =
            apply_slippage(quote.expected_amount_out, SLIPPAGE_SCALE - slippage_units);

        Ok(SwapParameters {
            token_in: request.token_in,
            token_out: request.token_out,
            fee_tier,
            recipient,
            deadline,
            amount_in: request.amount_in,
            amount_out_minimum,
            price_limit: request.effective_price_limit(),
            expected_amount_out: quote.expected_amount_out,
        })
    }

    fn deadline(&self, now: DateTime<Utc>) -> Result<u64> {
        let window = self.deadline_window.as_secs();
        if window == 0 {
            return Err(Error::invalid(
                ParameterField::Deadline,
                "deadline window must be at least one second",
            ));
        }
        let now = u64::try_from(now.timestamp())
            .map_err(|_| {
                Error::invalid(ParameterField::Deadline, "clock is before the unix epoch")
            })?;

        now.checked_add(window)
            .ok_or_else(|| Error::invalid(ParameterField::Deadline, "deadline overflows"))
    }
}

/// Tolerance expressed in `SLIPPAGE_SCALE` units
///
/// Tolerances on the 1e-9 grid map exactly. Finer ones round up, so the
/// minimum output never exceeds `floor(expected * (1 - tolerance))`.
fn slippage_units(tolerance: f64) -> Result<u64> {
    if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
        return Err(Error::invalid(
            ParameterField::SlippageTolerance,
            format!("{} is outside [0, 1)", tolerance),
        ));
    }

    let scaled = tolerance * SLIPPAGE_SCALE as f64;
    let nearest = scaled.round();
    // f64 noise on grid values stays well below this
    let units = if scaled - nearest > 1e-6 {
        nearest as u64 + 1
    } else {
        nearest as u64
    };
    if units >= SLIPPAGE_SCALE {
        return Err(Error::invalid(
            ParameterField::SlippageTolerance,
            format!("{} leaves no minimum output", tolerance),
        ));
    }
    Ok(units)
}

/// floor(amount * keep / SLIPPAGE_SCALE) without overflowing U256
fn apply_slippage(amount: U256, keep: u64) -> U256 {
    let scale = U256::from(SLIPPAGE_SCALE);
    let keep = U256::from(keep);
    let (whole, rest) = amount.div_rem(scale);
    whole * keep + rest * keep / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::FeeTier;
    use crate::tokens::addresses;
    use alloy::primitives::aliases::U160;
    use chrono::TimeZone;

    const E18: u128 = 1_000_000_000_000_000_000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn request(amount_in: U256, fee: u32, slippage: f64) -> SwapRequest {
        SwapRequest::new(addresses::DAI_ETH, addresses::UNI_ETH, fee, amount_in, slippage)
            .with_recipient(Address::repeat_byte(0x42))
    }

    fn quote_for(request: &SwapRequest, expected: U256) -> Quote {
        Quote {
            token_in: request.token_in,
            token_out: request.token_out,
            fee_tier: FeeTier::try_from(request.fee_tier).unwrap_or_default(),
            amount_in: request.amount_in,
            price_limit: request.effective_price_limit(),
            expected_amount_out: expected,
            quoted_at: now(),
        }
    }

    fn field_of(err: Error) -> ParameterField {
        match err {
            Error::InvalidParameters { field, .. } => field,
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
    }

    #[test]
    fn test_half_percent_slippage_floors_exactly() {
        let req = request(U256::from(E18), 3000, 0.005);
        let quote = quote_for(&req, U256::from(2 * E18));

        let params = ParameterBuilder::default().build(&req, &quote, now()).unwrap();

        assert_eq!(params.amount_out_minimum, U256::from(1_990_000_000_000_000_000u128));
        assert_eq!(params.deadline, 1_700_000_900);
        assert_eq!(params.fee_tier, FeeTier::Medium);
        assert_eq!(params.recipient, Address::repeat_byte(0x42));
    }

    #[test]
    fn test_one_percent_slippage() {
        let req = request(U256::from(E18), 3000, 0.01);
        let quote = quote_for(&req, U256::from(2 * E18));

        let params = ParameterBuilder::default().build(&req, &quote, now()).unwrap();
        assert_eq!(params.amount_out_minimum, U256::from(1_980_000_000_000_000_000u128));
    }

    #[test]
    fn test_floor_rounds_down() {
        let req = request(U256::from(1u64), 500, 0.003);
        let quote = quote_for(&req, U256::from(1_001u64));

        let params = ParameterBuilder::default().build(&req, &quote, now()).unwrap();
        // 1001 * 0.997 = 997.997
        assert_eq!(params.amount_out_minimum, U256::from(997u64));
    }

    #[test]
    fn test_minimum_never_exceeds_quote_and_deadline_is_future() {
        let amounts = [U256::from(1u64), U256::from(E18), U256::MAX >> 1];
        let expected = [U256::from(1u64), U256::from(999_999u64), U256::from(3 * E18), U256::MAX];
        let slippages = [0.0, 1e-9, 0.005, 0.3, 0.999];

        for amount in amounts {
            for fee in FeeTier::ALLOWED {
                for out in expected {
                    for slippage in slippages {
                        let req = request(amount, fee, slippage);
                        let quote = quote_for(&req, out);
                        let params = ParameterBuilder::default()
                            .build(&req, &quote, now())
                            .unwrap();

                        assert!(params.amount_out_minimum <= out);
                        assert!(params.deadline > now().timestamp() as u64);
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_slippage_keeps_full_quote() {
        let req = request(U256::from(E18), 3000, 0.0);
        let quote = quote_for(&req, U256::MAX);

        let params = ParameterBuilder::default().build(&req, &quote, now()).unwrap();
        assert_eq!(params.amount_out_minimum, U256::MAX);
    }

    #[test]
    fn test_zero_amount_is_invalid() {
        let req = request(U256::ZERO, 3000, 0.01);
        let quote = quote_for(&req, U256::from(E18));
        let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
        assert_eq!(field_of(err), ParameterField::AmountIn);
    }

    #[test]
    fn test_full_slippage_is_invalid() {
        for slippage in [1.0, 1.5, -0.01, f64::NAN, f64::INFINITY, 0.9999999999] {
            let req = request(U256::from(E18), 3000, slippage);
            let quote = quote_for(&req, U256::from(E18));
            let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
            assert_eq!(field_of(err), ParameterField::SlippageTolerance, "slippage {slippage}");
        }
    }

    #[test]
    fn test_unknown_fee_tier_is_invalid() {
        for fee in [0, 100, 2500, 10001] {
            let req = request(U256::from(E18), fee, 0.01);
            let quote = quote_for(&req, U256::from(E18));
            let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
            assert_eq!(field_of(err), ParameterField::FeeTier, "fee {fee}");
        }
    }

    #[test]
    fn test_mismatched_quote_is_invalid() {
        let req = request(U256::from(E18), 3000, 0.01);
        let other = request(U256::from(2 * E18), 3000, 0.01);
        let quote = quote_for(&other, U256::from(E18));

        let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
        assert_eq!(field_of(err), ParameterField::Quote);

        let limited = req.clone().with_price_limit(U160::from(7u64));
        let quote = quote_for(&req, U256::from(E18));
        let err = ParameterBuilder::default().build(&limited, &quote, now()).unwrap_err();
        assert_eq!(field_of(err), ParameterField::Quote);
    }

    #[test]
    fn test_zero_quote_is_invalid() {
        let req = request(U256::from(E18), 3000, 0.01);
        let quote = quote_for(&req, U256::ZERO);
        let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
        assert_eq!(field_of(err), ParameterField::Quote);
    }

    #[test]
    fn test_recipient_falls_back_to_default() {
        let mut req = request(U256::from(E18), 3000, 0.01);
        req.recipient = None;
        let quote = quote_for(&req, U256::from(E18));

        let err = ParameterBuilder::default().build(&req, &quote, now()).unwrap_err();
        assert_eq!(field_of(err), ParameterField::Recipient);

        let params = ParameterBuilder::default()
            .with_default_recipient(Address::repeat_byte(0x07))
            .build(&req, &quote, now())
            .unwrap();
        assert_eq!(params.recipient, Address::repeat_byte(0x07));
    }

    #[test]
    fn test_zero_window_is_invalid() {
        let req = request(U256::from(E18), 3000, 0.01);
        let quote = quote_for(&req, U256::from(E18));
        let err = ParameterBuilder::new(Duration::ZERO)
            .build(&req, &quote, now())
            .unwrap_err();
        assert_eq!(field_of(err), ParameterField::Deadline);
    }

    #[test]
    fn test_build_is_deterministic() {
        let req = request(U256::from(E18), 10000, 0.02);
        let quote = quote_for(&req, U256::from(5 * E18));
        let builder = ParameterBuilder::default();

        assert_eq!(
            builder.build(&req, &quote, now()).unwrap(),
            builder.build(&req, &quote, now()).unwrap()
        );
    }

    #[test]
    fn test_off_grid_tolerance_rounds_toward_more_slippage() {
        assert_eq!(slippage_units(0.005).unwrap(), 5_000_000);
        assert_eq!(slippage_units(0.0050000004).unwrap(), 5_000_001);
        assert_eq!(slippage_units(0.0050000006).unwrap(), 5_000_001);

        // floor(1e18 * (1 - 0.0050000004)) = 994_999_999_600_000_000
        let minimum = apply_slippage(
            U256::from(E18),
            SLIPPAGE_SCALE - slippage_units(0.0050000004).unwrap(),
        );
        assert_eq!(minimum, U256::from(994_999_999_000_000_000u128));
        assert!(minimum <= U256::from(994_999_999_600_000_000u128));
    }
}
