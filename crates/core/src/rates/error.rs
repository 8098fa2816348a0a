//! Rate resolution and policy configuration errors.

use coopledger_shared::types::AccountId;
use coopledger_shared::{AppError, ErrorCategory};
use thiserror::Error;

/// Errors raised while validating account policies or resolving rates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    // ========== Resolution Errors ==========
    /// No rate table row covers the queried value.
    #[error("No {table} band covers {value}")]
    NoMatchingBand {
        /// Name of the rate table that was searched.
        table: &'static str,
        /// The queried value (days, amount, term, date or year).
        value: String,
    },

    // ========== Configuration Errors ==========
    /// The account policy carries contradictory or out-of-range settings.
    #[error("Invalid policy for account {account_id}: {reason}")]
    InvalidPolicy {
        /// The misconfigured account.
        account_id: AccountId,
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Two rows of the same rate table cover overlapping ranges.
    #[error("Overlapping {table} bands: [{first}] and [{second}]")]
    OverlappingBands {
        /// Name of the rate table.
        table: &'static str,
        /// Bounds of the earlier band.
        first: String,
        /// Bounds of the overlapping band.
        second: String,
    },

    /// A band whose lower bound exceeds its upper bound.
    #[error("Invalid {table} band: from {from} is greater than to {to}")]
    InvertedBand {
        /// Name of the rate table.
        table: &'static str,
        /// Lower bound.
        from: String,
        /// Upper bound.
        to: String,
    },

    /// Loan terms or fixed days that cannot produce a payment schedule.
    #[error("Invalid terms: {0}")]
    InvalidTerms(String),
}

impl RateError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoMatchingBand { .. } => "NO_MATCHING_BAND",
            Self::InvalidPolicy { .. } => "INVALID_POLICY",
            Self::OverlappingBands { .. } => "OVERLAPPING_BANDS",
            Self::InvertedBand { .. } => "INVERTED_BAND",
            Self::InvalidTerms(_) => "INVALID_TERMS",
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoMatchingBand { .. } => ErrorCategory::NoMatchingBand,
            Self::InvalidPolicy { .. }
            | Self::OverlappingBands { .. }
            | Self::InvertedBand { .. }
            | Self::InvalidTerms(_) => ErrorCategory::Configuration,
        }
    }

    /// Rate errors are never retryable: the configuration must change first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<RateError> for AppError {
    fn from(err: RateError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RateError::NoMatchingBand {
            table: "fines maturity",
            value: "90 days".to_string(),
        };
        assert_eq!(err.error_code(), "NO_MATCHING_BAND");
        assert_eq!(err.category(), ErrorCategory::NoMatchingBand);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RateError::NoMatchingBand {
            table: "fines maturity",
            value: "90 days".to_string(),
        };
        assert_eq!(err.to_string(), "No fines maturity band covers 90 days");
    }

    #[test]
    fn test_configuration_errors_map_to_app_error() {
        let err = RateError::InvalidPolicy {
            account_id: AccountId::new(),
            reason: "both flags".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }
}
