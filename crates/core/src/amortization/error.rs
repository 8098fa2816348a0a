//! Amortization builder errors.

use rust_decimal::Decimal;
use thiserror::Error;

use coopledger_shared::{AppError, ErrorCategory};

use crate::rates::RateError;

/// Errors raised while building a loan's entry set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmortizationError {
    /// Rate resolution failed for one of the periods.
    #[error(transparent)]
    Rate(#[from] RateError),

    /// Principal must be positive.
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(Decimal),

    /// Netted deductions consume the whole principal.
    #[error("Deductions ({deductions}) exceed principal ({principal})")]
    DeductionsExceedPrincipal {
        /// Loan principal.
        principal: Decimal,
        /// Total netted from proceeds.
        deductions: Decimal,
    },

    /// The built entries do not net to the releasable proceeds.
    #[error("Amortization imbalance: entries net {actual}, expected proceeds {expected}")]
    AmortizationImbalance {
        /// Principal minus netted deductions.
        expected: Decimal,
        /// Signed sum of the entries before the cash line.
        actual: Decimal,
    },
}

impl AmortizationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rate(err) => err.error_code(),
            Self::InvalidPrincipal(_) => "INVALID_PRINCIPAL",
            Self::DeductionsExceedPrincipal { .. } => "DEDUCTIONS_EXCEED_PRINCIPAL",
            Self::AmortizationImbalance { .. } => "AMORTIZATION_IMBALANCE",
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Rate(err) => err.category(),
            Self::InvalidPrincipal(_) | Self::DeductionsExceedPrincipal { .. } => {
                ErrorCategory::Configuration
            }
            Self::AmortizationImbalance { .. } => ErrorCategory::InvariantViolation,
        }
    }

    /// Amortization errors are never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<AmortizationError> for AppError {
    fn from(err: AmortizationError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}
