//! Savings interest errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use coopledger_shared::types::{AccountId, GeneratedSavingsInterestId};
use coopledger_shared::{AppError, ErrorCategory};

use crate::posting::PostingError;
use crate::rates::RateError;

/// Errors raised while generating or posting savings interest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavingsError {
    /// The computation range is empty or reversed.
    #[error("Invalid computation range: {from} to {to}")]
    InvalidRange {
        /// Last computation date (inclusive).
        from: NaiveDate,
        /// New computation date (exclusive).
        to: NaiveDate,
    },

    /// A rate or tax percentage outside 0-100, or a zero divisor.
    #[error("Invalid savings interest setting {field}: {value}")]
    InvalidSetting {
        /// Setting name.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },

    /// The rate table is misconfigured.
    #[error(transparent)]
    Rate(#[from] RateError),

    /// Another run already covers the document number or date range.
    #[error("Duplicate savings interest run: {0}")]
    DuplicateRun(String),

    /// The run was already posted.
    #[error("Savings interest run {0} is already posted")]
    AlreadyPosted(GeneratedSavingsInterestId),

    /// The product given to post a run is not the one it was generated for.
    #[error("Savings interest run {run} was generated for account {expected}, not {found}")]
    ProductMismatch {
        /// The run.
        run: GeneratedSavingsInterestId,
        /// Savings account of the run.
        expected: AccountId,
        /// Savings account of the product given.
        found: AccountId,
    },

    /// The run does not exist.
    #[error("Unknown savings interest run: {0}")]
    UnknownRun(GeneratedSavingsInterestId),

    /// Posting the entries failed; none were posted.
    #[error(transparent)]
    Posting(#[from] PostingError),
}

impl SavingsError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::InvalidSetting { .. } => "INVALID_SAVINGS_SETTING",
            Self::Rate(err) => err.error_code(),
            Self::DuplicateRun(_) => "DUPLICATE_RUN",
            Self::AlreadyPosted(_) => "ALREADY_POSTED",
            Self::ProductMismatch { .. } => "PRODUCT_MISMATCH",
            Self::UnknownRun(_) => "UNKNOWN_RUN",
            Self::Posting(err) => err.error_code(),
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRange { .. }
            | Self::InvalidSetting { .. }
            | Self::ProductMismatch { .. } => ErrorCategory::Configuration,
            Self::Rate(err) => err.category(),
            Self::DuplicateRun(_) | Self::AlreadyPosted(_) => ErrorCategory::StateViolation,
            Self::UnknownRun(_) => ErrorCategory::NotFound,
            Self::Posting(err) => err.category(),
        }
    }

    /// Returns true if the run may be retried as is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<SavingsError> for AppError {
    fn from(err: SavingsError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_run_is_state_violation() {
        let err = SavingsError::DuplicateRun("SI-2024-001".into());
        assert_eq!(err.category(), ErrorCategory::StateViolation);
        assert_eq!(err.error_code(), "DUPLICATE_RUN");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_product_mismatch_is_not_retried() {
        let err = SavingsError::ProductMismatch {
            run: GeneratedSavingsInterestId::new(),
            expected: AccountId::new(),
            found: AccountId::new(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.error_code(), "PRODUCT_MISMATCH");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_posting_conflict_is_retryable() {
        let err = SavingsError::from(PostingError::PostingConflict("lock".into()));
        assert!(err.is_retryable());
    }
}
