//! Application-wide error types.
//!
//! Every engine error maps onto one [`ErrorCategory`] of the taxonomy, and
//! converts into [`AppError`] at the outer boundary.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy shared by all engine components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid or contradictory account/rate configuration. Never retried.
    Configuration,
    /// A rate table does not cover the query. Fatal per request.
    NoMatchingBand,
    /// An arithmetic invariant was violated. Always fatal.
    InvariantViolation,
    /// Transient contention. Retried locally, then surfaced.
    Transient,
    /// A state machine rejected the operation. Never retried.
    StateViolation,
    /// A referenced entity does not exist.
    NotFound,
    /// The persistence collaborator failed.
    Storage,
}

impl ErrorCategory {
    /// Returns true if errors in this category may succeed on retry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Account or rate-table configuration must be fixed by an operator.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Accounting invariant violated.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Conflict (e.g., concurrent posting on the same ledger).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// State machine violation (e.g., closed batch).
    #[error("State violation: {0}")]
    StateViolation(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds an `AppError` from a categorized engine error message.
    #[must_use]
    pub fn from_category(category: ErrorCategory, message: String) -> Self {
        match category {
            ErrorCategory::Configuration => Self::Configuration(message),
            ErrorCategory::NoMatchingBand => Self::Validation(message),
            ErrorCategory::InvariantViolation => Self::InvariantViolation(message),
            ErrorCategory::Transient => Self::Conflict(message),
            ErrorCategory::StateViolation => Self::StateViolation(message),
            ErrorCategory::NotFound => Self::NotFound(message),
            ErrorCategory::Storage => Self::Storage(message),
        }
    }

    /// Returns the HTTP-style status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Configuration(_) | Self::InvariantViolation(_) | Self::StateViolation(_) => 422,
            Self::Conflict(_) => 409,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::StateViolation(_) => "STATE_VIOLATION",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
