//! Persistence errors.

use thiserror::Error;

use coopledger_core::batch::BatchError;
use coopledger_core::posting::{LedgerKey, PostingError};
use coopledger_core::savings::SavingsError;
use coopledger_shared::types::{GeneratedSavingsInterestId, TransactionBatchId};
use coopledger_shared::{AppError, ErrorCategory};

/// Errors returned by a [`LedgerStore`](crate::LedgerStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A running balance key moved since it was read.
    #[error("Version conflict on {key:?}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Contended key.
        key: LedgerKey,
        /// Version read before computing balances.
        expected: u64,
        /// Version found at commit.
        actual: u64,
    },

    /// A batch tagged on the commit stopped accepting rows.
    #[error("Transaction batch {0} does not accept this posting")]
    BatchNotAccepting(TransactionBatchId),

    /// A batch tagged on the commit does not exist.
    #[error("Unknown transaction batch: {0}")]
    UnknownBatch(TransactionBatchId),

    /// The savings interest run on the commit is already posted.
    #[error("Savings interest run {0} is already posted")]
    RunAlreadyPosted(GeneratedSavingsInterestId),

    /// A unique value is already taken.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The backend is unavailable or failed the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::BatchNotAccepting(_) => "BATCH_NOT_ACCEPTING",
            Self::UnknownBatch(_) => "UNKNOWN_BATCH",
            Self::RunAlreadyPosted(_) => "RUN_ALREADY_POSTED",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::VersionConflict { .. } => ErrorCategory::Transient,
            Self::BatchNotAccepting(_) | Self::RunAlreadyPosted(_) | Self::Duplicate(_) => {
                ErrorCategory::StateViolation
            }
            Self::UnknownBatch(_) => ErrorCategory::NotFound,
            Self::Unavailable(_) => ErrorCategory::Storage,
        }
    }

    /// Returns true if the operation may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}

impl From<StoreError> for PostingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                key,
                expected,
                actual,
            } => Self::ConcurrentBalanceConflict {
                member_id: key.member_id,
                account_id: key.account_id,
                expected,
                actual,
            },
            StoreError::BatchNotAccepting(id) => Self::BatchClosed(id),
            StoreError::UnknownBatch(id) => Self::UnknownBatch(id),
            StoreError::RunAlreadyPosted(id) => {
                Self::DuplicatePosting(format!("savings interest run {id}"))
            }
            StoreError::Duplicate(msg) | StoreError::Unavailable(msg) => Self::Storage(msg),
        }
    }
}

impl From<StoreError> for BatchError {
    fn from(err: StoreError) -> Self {
        Self::Posting(err.into())
    }
}

impl From<StoreError> for SavingsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => Self::DuplicateRun(msg),
            StoreError::RunAlreadyPosted(id) => Self::AlreadyPosted(id),
            other => Self::Posting(other.into()),
        }
    }
}
