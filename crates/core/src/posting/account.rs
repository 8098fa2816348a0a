//! Chart of accounts view used by the poster.

use serde::{Deserialize, Serialize};

use coopledger_shared::types::AccountId;

use super::balance::AccountTypeForBalance;

/// Broad account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Cash on hand (teller cash).
    Cash,
    /// Cash in bank.
    CashInBank,
    /// Member savings deposits.
    Savings,
    /// Member time deposits.
    TimeDeposit,
    /// Loan and other receivables.
    Receivable,
    /// Income accounts.
    Income,
    /// Expense accounts.
    Expense,
    /// Payables and withholdings.
    Payable,
    /// Overage/shortage suspense.
    Suspense,
    /// Anything else.
    Other,
}

impl AccountKind {
    /// Default normal side of the kind.
    #[must_use]
    pub const fn normal_side(self) -> AccountTypeForBalance {
        match self {
            Self::Cash | Self::CashInBank | Self::Receivable | Self::Expense | Self::Other => {
                AccountTypeForBalance::DebitNormal
            }
            Self::Savings | Self::TimeDeposit | Self::Income | Self::Payable | Self::Suspense => {
                AccountTypeForBalance::CreditNormal
            }
        }
    }
}

/// Account information needed to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account ID.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Classification.
    pub kind: AccountKind,
    /// Normal side used for running balances.
    pub normal: AccountTypeForBalance,
}

impl AccountInfo {
    /// An account with the kind's default normal side.
    #[must_use]
    pub fn new(id: AccountId, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            normal: kind.normal_side(),
        }
    }
}
