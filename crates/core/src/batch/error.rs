//! Transaction batch errors.

use rust_decimal::Decimal;
use thiserror::Error;

use coopledger_shared::types::TransactionBatchId;
use coopledger_shared::{AppError, ErrorCategory};

use super::types::BatchState;
use crate::posting::PostingError;

/// Errors raised by the transaction batch state machine and reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    // ========== State Errors ==========
    /// Another close of the same batch is in flight.
    #[error("Transaction batch {0} is already closing")]
    AlreadyClosing(TransactionBatchId),

    /// The batch is closed and accepts nothing.
    #[error("Transaction batch {0} is closed")]
    BatchClosed(TransactionBatchId),

    /// The batch is not open for new entries.
    #[error("Transaction batch {id} does not accept entries while {state}")]
    NotOpen {
        /// Batch.
        id: TransactionBatchId,
        /// Current state.
        state: BatchState,
    },

    /// The batch does not exist.
    #[error("Unknown transaction batch: {0}")]
    UnknownBatch(TransactionBatchId),

    // ========== Validation Errors ==========
    /// A cash count with a non-positive denomination or negative quantity.
    #[error("Invalid cash count: {quantity} x {denomination}")]
    InvalidCashCount {
        /// Bill or coin value.
        denomination: Decimal,
        /// Pieces counted.
        quantity: i64,
    },

    /// A funding, remittance or bank deposit that is not positive.
    #[error("Invalid {what} amount: {amount}")]
    InvalidAmount {
        /// Kind of amount.
        what: &'static str,
        /// Offending amount.
        amount: Decimal,
    },

    // ========== Configuration Errors ==========
    /// No active overage/shortage configuration for the batch currency.
    #[error("No active unbalanced account configured for currency {currency}")]
    MissingUnbalancedAccount {
        /// Batch currency.
        currency: String,
    },

    /// More than one active overage/shortage configuration for the currency.
    #[error("Multiple active unbalanced accounts configured for currency {currency}")]
    DuplicateUnbalancedAccount {
        /// Batch currency.
        currency: String,
    },

    // ========== Posting Errors ==========
    /// Posting the variance failed.
    #[error(transparent)]
    Posting(#[from] PostingError),
}

impl BatchError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyClosing(_) => "ALREADY_CLOSING",
            Self::BatchClosed(_) => "BATCH_CLOSED",
            Self::NotOpen { .. } => "BATCH_NOT_OPEN",
            Self::UnknownBatch(_) => "UNKNOWN_BATCH",
            Self::InvalidCashCount { .. } => "INVALID_CASH_COUNT",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::MissingUnbalancedAccount { .. } => "MISSING_UNBALANCED_ACCOUNT",
            Self::DuplicateUnbalancedAccount { .. } => "DUPLICATE_UNBALANCED_ACCOUNT",
            Self::Posting(err) => err.error_code(),
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyClosing(_) | Self::BatchClosed(_) | Self::NotOpen { .. } => {
                ErrorCategory::StateViolation
            }
            Self::UnknownBatch(_) => ErrorCategory::NotFound,
            Self::InvalidCashCount { .. } | Self::InvalidAmount { .. } => {
                ErrorCategory::InvariantViolation
            }
            Self::MissingUnbalancedAccount { .. } | Self::DuplicateUnbalancedAccount { .. } => {
                ErrorCategory::Configuration
            }
            Self::Posting(err) => err.category(),
        }
    }

    /// Returns true if the close may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_are_not_retried() {
        let id = TransactionBatchId::new();
        assert_eq!(
            BatchError::AlreadyClosing(id).category(),
            ErrorCategory::StateViolation
        );
        assert!(!BatchError::BatchClosed(id).is_retryable());
    }

    #[test]
    fn test_missing_configuration() {
        let err = BatchError::MissingUnbalancedAccount {
            currency: "PHP".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.error_code(), "MISSING_UNBALANCED_ACCOUNT");
        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }

    #[test]
    fn test_posting_errors_keep_their_category() {
        let err = BatchError::from(PostingError::PostingConflict("timeout".into()));
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "POSTING_CONFLICT");
    }
}
