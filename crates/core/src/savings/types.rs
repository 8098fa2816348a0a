//! Savings interest run types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use coopledger_shared::types::{
    AccountId, GeneratedSavingsInterestId, MemberId, MemberTypeId, Scope, UserId,
};

use super::error::SavingsError;
use crate::posting::{
    AccountTypeForBalance, EventContext, EventKind, FinancialEvent, GeneralLedgerRow,
};
use crate::rates::InterestRateTable;

/// Balance basis of a savings interest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsComputationType {
    /// Lowest daily ending balance of the range.
    DailyLowestBalance,
    /// Average of the daily ending balances.
    AverageDailyBalance,
    /// Lowest of the month-end balances.
    MonthlyEndLowestBalance,
    /// Average daily balance, capped at the ending balance.
    #[serde(rename = "adb_end_balance")]
    AdbEndBalance,
    /// Average of each month's lowest balance.
    MonthlyLowestBalanceAverage,
    /// Average of the month-end balances.
    MonthlyEndBalanceAverage,
    /// Each month-end balance earns for its own month.
    MonthlyEndBalanceTotal,
}

impl SavingsComputationType {
    /// Returns true for the lowest and month-end formulas, which pay nothing
    /// for ranges shorter than 30 days.
    #[must_use]
    pub fn needs_full_month(self) -> bool {
        !matches!(self, Self::AverageDailyBalance)
    }
}

/// Savings product settings used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsProduct {
    /// Member savings account.
    pub account_id: AccountId,
    /// Annual rate in percent.
    pub interest_rate: Decimal,
    /// Rate override by year, date or ending balance.
    pub rate_table: Option<InterestRateTable>,
    /// Ending balance below which no interest is paid.
    pub minimum_balance: Decimal,
    /// Charged when the ending balance is below the minimum; zero skips.
    pub below_minimum_charge: Decimal,
    /// Interest is subject to withholding tax.
    pub taxable: bool,
    /// Interest expense account debited.
    pub interest_expense_account: AccountId,
    /// Withholding tax payable account credited.
    pub tax_payable_account: AccountId,
}

/// One (member, account) pair considered by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavingsCandidate {
    /// Depositor.
    pub member_id: MemberId,
    /// Depositor's member type.
    pub member_type_id: Option<MemberTypeId>,
    /// The account is closed for the member.
    pub closed: bool,
    /// Normal side of the savings account.
    pub normal: AccountTypeForBalance,
    /// Ledger rows of the (member, account) key.
    pub rows: Vec<GeneralLedgerRow>,
}

/// Parameters of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsRunRequest {
    /// Owning organization and branch.
    pub scope: Scope,
    /// Document number; unique per scope.
    pub document_no: String,
    /// First day of the range (inclusive).
    pub last_computation_date: NaiveDate,
    /// End of the range (exclusive).
    pub new_computation_date: NaiveDate,
    /// Balance basis.
    pub computation_type: SavingsComputationType,
    /// Withholding tax in percent; the branch default when `None`.
    pub interest_tax_rate: Option<Decimal>,
    /// Only members of this type.
    pub member_type_id: Option<MemberTypeId>,
    /// Include accounts closed for the member.
    pub include_closed_account: bool,
    /// Acting employee.
    pub employee_user_id: UserId,
}

impl SavingsRunRequest {
    /// Number of days in the range.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.new_computation_date - self.last_computation_date).num_days()
    }

    /// Fails unless the range holds at least one day.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange`.
    pub fn validate(&self) -> Result<(), SavingsError> {
        if self.days() <= 0 {
            return Err(SavingsError::InvalidRange {
                from: self.last_computation_date,
                to: self.new_computation_date,
            });
        }
        Ok(())
    }

    /// Returns true if a candidate passes the member type and closed filters.
    #[must_use]
    pub fn qualifies(&self, candidate: &SavingsCandidate) -> bool {
        if candidate.closed && !self.include_closed_account {
            return false;
        }
        match self.member_type_id {
            Some(wanted) => candidate.member_type_id == Some(wanted),
            None => true,
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsRunStatus {
    /// Entries generated, nothing posted.
    Pending,
    /// Every entry posted.
    Posted,
}

impl fmt::Display for SavingsRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Posted => write!(f, "posted"),
        }
    }
}

/// Interest computed for one (member, account) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSavingsInterestEntry {
    /// Depositor.
    pub member_id: MemberId,
    /// Savings account.
    pub account_id: AccountId,
    /// Interest; negative for a below-minimum charge.
    pub interest_amount: Decimal,
    /// Withholding tax.
    pub interest_tax: Decimal,
    /// Balance after the entry is posted.
    pub ending_balance: Decimal,
}

/// Header of a savings interest run with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSavingsInterest {
    /// Run ID.
    pub id: GeneratedSavingsInterestId,
    /// The parameters the run was generated with.
    pub request: SavingsRunRequest,
    /// Savings account.
    pub account_id: AccountId,
    /// Tax rate applied.
    pub interest_tax_rate: Decimal,
    /// Entries ordered by member.
    pub entries: Vec<GeneratedSavingsInterestEntry>,
    /// Lifecycle state.
    pub status: SavingsRunStatus,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Posting timestamp.
    pub posted_at: Option<DateTime<Utc>>,
}

impl GeneratedSavingsInterest {
    /// Σ interest.
    #[must_use]
    pub fn total_interest(&self) -> Decimal {
        self.entries.iter().map(|e| e.interest_amount).sum()
    }

    /// Σ tax.
    #[must_use]
    pub fn total_tax(&self) -> Decimal {
        self.entries.iter().map(|e| e.interest_tax).sum()
    }

    /// Returns true if the date ranges of two runs share a day.
    #[must_use]
    pub fn overlaps(&self, request: &SavingsRunRequest) -> bool {
        let mine = &self.request;
        mine.last_computation_date < request.new_computation_date
            && request.last_computation_date < mine.new_computation_date
    }

    /// One savings interest event per entry, in entry order.
    #[must_use]
    pub fn posting_events(&self, product: &SavingsProduct) -> Vec<FinancialEvent> {
        let req = &self.request;
        let entry_date = req
            .new_computation_date
            .pred_opt()
            .unwrap_or(req.new_computation_date);
        self.entries
            .iter()
            .map(|entry| {
                let context = EventContext::new(req.scope, req.employee_user_id, entry_date)
                    .with_reference(req.document_no.clone())
                    .with_description(format!(
                        "Savings interest {} to {}",
                        req.last_computation_date, req.new_computation_date
                    ));
                FinancialEvent::new(
                    context,
                    EventKind::SavingsInterest {
                        member_id: entry.member_id,
                        savings_account: entry.account_id,
                        interest_expense_account: product.interest_expense_account,
                        tax_payable_account: product.tax_payable_account,
                        interest: entry.interest_amount,
                        tax: entry.interest_tax,
                    },
                )
            })
            .collect()
    }
}
