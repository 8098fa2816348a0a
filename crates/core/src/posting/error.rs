//! Posting errors.

use rust_decimal::Decimal;
use thiserror::Error;

use coopledger_shared::types::{AccountId, MemberId, TransactionBatchId};
use coopledger_shared::{AppError, ErrorCategory};

/// Errors raised while planning or posting a financial event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingError {
    // ========== Validation Errors ==========
    /// A posting needs at least one debit and one credit line.
    #[error("Posting must have at least 2 lines")]
    InsufficientLines,

    /// All lines are on the same side.
    #[error("Posting must have both debit and credit lines")]
    SingleSided,

    /// A line amount is zero or negative.
    #[error("Line amount for account {account_id} must be positive, got {amount}")]
    NonPositiveAmount {
        /// The account of the line.
        account_id: AccountId,
        /// The offending amount.
        amount: Decimal,
    },

    /// A line amount has more than two decimal places.
    #[error("Line amount {amount} for account {account_id} is not rounded to cents")]
    UnroundedAmount {
        /// The account of the line.
        account_id: AccountId,
        /// The offending amount.
        amount: Decimal,
    },

    /// A source entry carries both a debit and a credit, or neither.
    #[error("Entry {index} must carry exactly one of debit or credit")]
    InvalidEntry {
        /// Position of the entry in its set.
        index: u32,
    },

    /// Debits and credits differ.
    #[error("Imbalanced posting: debit {debit} != credit {credit}")]
    ImbalancedPosting {
        /// Total debits.
        debit: Decimal,
        /// Total credits.
        credit: Decimal,
    },

    // ========== Reference Errors ==========
    /// The referenced account does not exist.
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    /// The event is tagged with a batch that does not accept entries.
    #[error("Transaction batch {0} is closed")]
    BatchClosed(TransactionBatchId),

    /// The event is tagged with a batch that does not exist.
    #[error("Unknown transaction batch: {0}")]
    UnknownBatch(TransactionBatchId),

    /// The document these events settle was already posted.
    #[error("Already posted: {0}")]
    DuplicatePosting(String),

    // ========== Concurrency Errors ==========
    /// The running balance moved between read and commit.
    #[error(
        "Concurrent balance update on account {account_id} (member {member_id:?}): expected version {expected}, found {actual}"
    )]
    ConcurrentBalanceConflict {
        /// Member of the contended key.
        member_id: Option<MemberId>,
        /// Account of the contended key.
        account_id: AccountId,
        /// Version read before computing balances.
        expected: u64,
        /// Version found at commit.
        actual: u64,
    },

    /// Retries or the lock wait were exhausted.
    #[error("Posting conflict: {0}")]
    PostingConflict(String),

    // ========== Storage Errors ==========
    /// The persistence collaborator failed; nothing was persisted.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines => "INSUFFICIENT_LINES",
            Self::SingleSided => "SINGLE_SIDED",
            Self::NonPositiveAmount { .. } => "NON_POSITIVE_AMOUNT",
            Self::UnroundedAmount { .. } => "UNROUNDED_AMOUNT",
            Self::InvalidEntry { .. } => "INVALID_ENTRY",
            Self::ImbalancedPosting { .. } => "IMBALANCED_POSTING",
            Self::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
            Self::BatchClosed(_) => "BATCH_CLOSED",
            Self::UnknownBatch(_) => "UNKNOWN_BATCH",
            Self::DuplicatePosting(_) => "DUPLICATE_POSTING",
            Self::ConcurrentBalanceConflict { .. } => "CONCURRENT_BALANCE_CONFLICT",
            Self::PostingConflict(_) => "POSTING_CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InsufficientLines
            | Self::SingleSided
            | Self::NonPositiveAmount { .. }
            | Self::UnroundedAmount { .. }
            | Self::InvalidEntry { .. }
            | Self::ImbalancedPosting { .. } => ErrorCategory::InvariantViolation,
            Self::UnknownAccount(_) | Self::UnknownBatch(_) => ErrorCategory::NotFound,
            Self::BatchClosed(_) | Self::DuplicatePosting(_) => ErrorCategory::StateViolation,
            Self::ConcurrentBalanceConflict { .. } | Self::PostingConflict(_) => {
                ErrorCategory::Transient
            }
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Returns true if the caller may retry the same event.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        Self::from_category(err.category(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_imbalanced_is_fatal() {
        let err = PostingError::ImbalancedPosting {
            debit: dec!(100),
            credit: dec!(99.99),
        };
        assert_eq!(err.error_code(), "IMBALANCED_POSTING");
        assert_eq!(err.category(), ErrorCategory::InvariantViolation);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Imbalanced posting: debit 100 != credit 99.99"
        );
    }

    #[test]
    fn test_conflicts_are_retryable() {
        let err = PostingError::ConcurrentBalanceConflict {
            member_id: None,
            account_id: AccountId::new(),
            expected: 3,
            actual: 4,
        };
        assert!(err.is_retryable());
        assert!(PostingError::PostingConflict("lock timeout".into()).is_retryable());
    }

    #[test]
    fn test_batch_closed_maps_to_state_violation() {
        let err = PostingError::BatchClosed(TransactionBatchId::new());
        assert!(matches!(AppError::from(err), AppError::StateViolation(_)));
    }
}
