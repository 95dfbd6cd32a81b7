//! Error types for the swap executor

use alloy::primitives::TxHash;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Quote,
    Parameters,
    Signing,
    Broadcast,
    Confirmation,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::Quote => "quote",
            Stage::Parameters => "parameters",
            Stage::Signing => "signing",
            Stage::Broadcast => "broadcast",
            Stage::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request or derived field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterField {
    TokenIn,
    TokenOut,
    FeeTier,
    AmountIn,
    SlippageTolerance,
    PriceLimit,
    Recipient,
    Deadline,
    Quote,
}

impl ParameterField {
    pub fn name(&self) -> &'static str {
        match self {
            ParameterField::TokenIn => "token_in",
            ParameterField::TokenOut => "token_out",
            ParameterField::FeeTier => "fee_tier",
            ParameterField::AmountIn => "amount_in",
            ParameterField::SlippageTolerance => "slippage_tolerance",
            ParameterField::PriceLimit => "price_limit",
            ParameterField::Recipient => "recipient",
            ParameterField::Deadline => "deadline",
            ParameterField::Quote => "quote",
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rejection reasons reported by the execution node on submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Broadcast failed: {0}")]
    Other(String),
}

impl BroadcastError {
    /// Whether the node definitely did not accept the transaction
    pub fn was_rejected(&self) -> bool {
        !matches!(self, BroadcastError::Other(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quote failed: {0}")]
    QuoteFailed(String),

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameters {
        field: ParameterField,
        reason: String,
    },

    #[error("Preflight simulation reverted: {0}")]
    PreflightReverted(String),

    /// The preflight never ran; says nothing about whether the swap would revert
    #[error("Preflight simulation unavailable: {0}")]
    PreflightUnavailable(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error("Receipt lookup failed for {transaction_id}: {reason}")]
    ReceiptUnavailable {
        transaction_id: TxHash,
        reason: String,
    },

    #[error("No receipt for {transaction_id} after {waited:?}; outcome unknown")]
    ConfirmationTimeout {
        transaction_id: TxHash,
        waited: Duration,
    },
}

impl Error {
    pub(crate) fn invalid(field: ParameterField, reason: impl Into<String>) -> Self {
        Error::InvalidParameters {
            field,
            reason: reason.into(),
        }
    }

    /// Stage that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config(_) => Stage::Configuration,
            Error::QuoteFailed(_) => Stage::Quote,
            Error::InvalidParameters { .. }
            | Error::PreflightReverted(_)
            | Error::PreflightUnavailable(_) => Stage::Parameters,
            Error::SigningFailed(_) => Stage::Signing,
            Error::Broadcast(_) => Stage::Broadcast,
            Error::ReceiptUnavailable { .. } | Error::ConfirmationTimeout { .. } => {
                Stage::Confirmation
            }
        }
    }

    /// False when the transaction may still be mined: its outcome is unknown, not failed.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Error::ConfirmationTimeout { .. } | Error::ReceiptUnavailable { .. }
        )
    }

    /// Whether re-running the pipeline (fresh quote, nonce and signature) cannot
    /// double-execute the swap.
    pub fn safe_to_retry_with_fresh_parameters(&self) -> bool {
        match self {
            Error::QuoteFailed(_)
            | Error::InvalidParameters { .. }
            | Error::PreflightReverted(_)
            | Error::PreflightUnavailable(_)
            | Error::SigningFailed(_) => true,
            Error::Broadcast(e) => e.was_rejected(),
            Error::Config(_)
            | Error::ReceiptUnavailable { .. }
            | Error::ConfirmationTimeout { .. } => false,
        }
    }

    /// Transaction hash, if the error happened after broadcast
    pub fn transaction_id(&self) -> Option<TxHash> {
        match self {
            Error::ReceiptUnavailable { transaction_id, .. }
            | Error::ConfirmationTimeout { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
