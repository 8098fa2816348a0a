//! General ledger row types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{
    AccountId, GeneralLedgerId, MemberId, Scope, TransactionBatchId, TransactionId, UserId,
};

/// Side of a ledger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Debit line.
    Debit,
    /// Credit line.
    Credit,
}

/// Business origin of a general ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerSource {
    /// Savings withdrawal.
    Withdraw,
    /// Savings deposit.
    Deposit,
    /// Loan payment.
    Payment,
    /// Manual adjustment.
    Adjustment,
    /// Journal voucher.
    Journal,
    /// Check voucher.
    CheckVoucher,
    /// Loan release entries.
    Loan,
    /// Generated savings interest.
    SavingsInterest,
    /// Cash disbursement.
    Disbursement,
    /// Transaction batch overage or shortage.
    BatchVariance,
}

/// Identifies one running balance: a GL account, optionally for one member.
///
/// Ordering is total so that locks can be taken in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    /// Member subsidiary ledger, `None` for the GL-level account.
    pub member_id: Option<MemberId>,
    /// Account.
    pub account_id: AccountId,
}

impl LedgerKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(member_id: Option<MemberId>, account_id: AccountId) -> Self {
        Self {
            member_id,
            account_id,
        }
    }
}

/// A posted general ledger row. `debit` and `credit` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralLedgerRow {
    /// Row ID.
    pub id: GeneralLedgerId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Atomic group this row belongs to.
    pub transaction_id: TransactionId,
    /// Cashier batch the row was posted under.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// Member, for subsidiary ledger rows.
    pub member_id: Option<MemberId>,
    /// Account.
    pub account_id: AccountId,
    /// Business origin.
    pub source: LedgerSource,
    /// Effective date.
    pub entry_date: NaiveDate,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Running balance of the (member, account) key after this row.
    pub balance: Decimal,
    /// Version of the (member, account) key after this row.
    pub ledger_version: u64,
    /// Acting employee.
    pub employee_user_id: UserId,
    /// Optional OR/voucher reference.
    pub reference_number: Option<String>,
    /// Description.
    pub description: String,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

impl GeneralLedgerRow {
    /// Running balance key of this row.
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.member_id, self.account_id)
    }

    /// Debit minus credit.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Side of the row.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        if self.debit > Decimal::ZERO {
            EntryType::Debit
        } else {
            EntryType::Credit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serializes_kebab_case() {
        let json = serde_json::to_string(&LedgerSource::CheckVoucher).unwrap();
        assert_eq!(json, "\"check-voucher\"");
        let json = serde_json::to_string(&LedgerSource::SavingsInterest).unwrap();
        assert_eq!(json, "\"savings-interest\"");
    }

    #[test]
    fn test_key_ordering_is_total() {
        let account = AccountId::new();
        let gl = LedgerKey::new(None, account);
        let member = LedgerKey::new(Some(MemberId::new()), account);
        assert!(gl < member);
    }
}
