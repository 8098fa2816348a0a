//! Balance rules for posting lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::round_money;

use super::entry::EntryType;
use super::error::PostingError;
use super::plan::PostingLine;

/// Debit and credit totals of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingTotals {
    /// Total debits.
    pub debit: Decimal,
    /// Total credits.
    pub credit: Decimal,
    /// Debits equal credits exactly.
    pub is_balanced: bool,
}

impl PostingTotals {
    /// Creates totals from debit and credit sums.
    #[must_use]
    pub fn new(debit: Decimal, credit: Decimal) -> Self {
        Self {
            debit,
            credit,
            is_balanced: debit == credit,
        }
    }

    /// Debits minus credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Validates posting lines and returns their totals.
///
/// Amounts must be positive and already rounded to cents; totals are
/// compared exactly.
///
/// # Errors
///
/// Returns `InsufficientLines`, `NonPositiveAmount`, `UnroundedAmount`,
/// `SingleSided` or `ImbalancedPosting`.
pub fn validate_lines(lines: &[PostingLine]) -> Result<PostingTotals, PostingError> {
    if lines.len() < 2 {
        return Err(PostingError::InsufficientLines);
    }

    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;
    let mut has_debit = false;
    let mut has_credit = false;

    for line in lines {
        if line.amount <= Decimal::ZERO {
            return Err(PostingError::NonPositiveAmount {
                account_id: line.account_id,
                amount: line.amount,
            });
        }
        if round_money(line.amount) != line.amount {
            return Err(PostingError::UnroundedAmount {
                account_id: line.account_id,
                amount: line.amount,
            });
        }
        match line.entry_type {
            EntryType::Debit => {
                debit += line.amount;
                has_debit = true;
            }
            EntryType::Credit => {
                credit += line.amount;
                has_credit = true;
            }
        }
    }

    if !has_debit || !has_credit {
        return Err(PostingError::SingleSided);
    }

    let totals = PostingTotals::new(debit, credit);
    if !totals.is_balanced {
        return Err(PostingError::ImbalancedPosting { debit, credit });
    }
    Ok(totals)
}
