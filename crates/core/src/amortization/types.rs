//! Loan transaction entry types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{AccountId, MemberTypeId, percent_of, round_money};

use crate::rates::{AccountPolicy, ChargesRateScheme};

/// Kind of a loan transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanEntryKind {
    /// Principal and cash release lines.
    Static,
    /// Amounts netted from proceeds (charges, advance interest).
    Deduction,
    /// Amounts added to the payable (interest and fines accruals).
    AddOn,
    /// Configured automatic loan deductions.
    AutomaticDeduction,
    /// Outstanding balance of a renewed loan, paid from proceeds.
    Previous,
}

/// One row of a loan's entry set. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransactionEntry {
    /// Position in the set, starting at 0.
    pub index: u32,
    /// Entry kind.
    pub kind: LoanEntryKind,
    /// Account posted to.
    pub account_id: AccountId,
    /// The account is a member subsidiary ledger (receivables).
    pub member_ledger: bool,
    /// Description shown on the ledger row.
    pub description: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

impl LoanTransactionEntry {
    /// Signed amount: debit minus credit.
    #[must_use]
    pub fn signed(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true if the entry reduces the releasable proceeds.
    #[must_use]
    pub fn is_netted(&self) -> bool {
        self.credit > Decimal::ZERO
            && matches!(
                self.kind,
                LoanEntryKind::Deduction | LoanEntryKind::AutomaticDeduction | LoanEntryKind::Previous
            )
    }
}

/// Accounts a loan product posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAccounts {
    /// Member loan receivable.
    pub loan_receivable: AccountId,
    /// Member interest receivable.
    pub interest_receivable: AccountId,
    /// Interest income, credited when interest is collected upfront.
    pub interest_income: AccountId,
    /// Unearned interest, credited for add-on interest.
    pub unearned_interest: AccountId,
    /// Member fines receivable.
    pub fines_receivable: AccountId,
    /// Unearned fines, credited for maturity fines accruals.
    pub unearned_fines: AccountId,
    /// Cash or disbursement account credited with the proceeds.
    pub cash: AccountId,
}

/// How an automatic deduction amount is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionBasis {
    /// `charges_amount` as configured.
    #[default]
    Flat,
    /// From the principal: percentage, then divisor, then month scaling.
    Principal,
}

/// A configured automatic loan deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomaticLoanDeduction {
    /// Account credited with the deduction.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Flat amount or computed from the principal.
    #[serde(default)]
    pub basis: DeductionBasis,
    /// Percentage of principal when the deduction is netted.
    pub charges_percentage_1: Decimal,
    /// Percentage of principal when the deduction is added on.
    pub charges_percentage_2: Decimal,
    /// Flat amount, or the multiplier applied after `charges_divisor`.
    pub charges_amount: Decimal,
    /// Divisor for "amount per divisor" deductions.
    pub charges_divisor: Decimal,
    /// Deduction applies only to principals at least this large.
    pub min_amount: Decimal,
    /// Deduction applies only to principals at most this large.
    pub max_amount: Decimal,
    /// `0` no scaling, `-1` scale by terms/12, `n > 0` scale by terms/n.
    pub number_of_months: i32,
    /// With `number_of_months == 0`: the rate is annual, take one month.
    pub anum: bool,
    /// Added to the payable instead of netted from proceeds.
    pub add_on: bool,
}

impl AutomaticLoanDeduction {
    /// A flat deduction.
    #[must_use]
    pub fn flat(account_id: AccountId, name: impl Into<String>, amount: Decimal, add_on: bool) -> Self {
        Self {
            account_id,
            name: name.into(),
            basis: DeductionBasis::Flat,
            charges_percentage_1: Decimal::ZERO,
            charges_percentage_2: Decimal::ZERO,
            charges_amount: amount,
            charges_divisor: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
            number_of_months: 0,
            anum: false,
            add_on,
        }
    }

    /// A percentage-of-principal deduction.
    #[must_use]
    pub fn percentage(account_id: AccountId, name: impl Into<String>, percent: Decimal, add_on: bool) -> Self {
        let mut deduction = Self::flat(account_id, name, Decimal::ZERO, add_on);
        deduction.basis = DeductionBasis::Principal;
        if add_on {
            deduction.charges_percentage_2 = percent;
        } else {
            deduction.charges_percentage_1 = percent;
        }
        deduction
    }

    /// `charges_amount` per `divisor` of principal.
    #[must_use]
    pub fn per_divisor(
        account_id: AccountId,
        name: impl Into<String>,
        amount: Decimal,
        divisor: Decimal,
        add_on: bool,
    ) -> Self {
        let mut deduction = Self::flat(account_id, name, amount, add_on);
        deduction.basis = DeductionBasis::Principal;
        deduction.charges_divisor = divisor;
        deduction
    }

    /// Deduction amount for a loan, rounded to cents.
    ///
    /// Zero when the principal is outside `[min_amount, max_amount]`.
    #[must_use]
    pub fn amount(&self, principal: Decimal, terms: u32) -> Decimal {
        if self.min_amount > Decimal::ZERO && principal < self.min_amount {
            return Decimal::ZERO;
        }
        if self.max_amount > Decimal::ZERO && principal > self.max_amount {
            return Decimal::ZERO;
        }
        if self.basis == DeductionBasis::Flat {
            return round_money(self.charges_amount);
        }

        let pct1 = self.charges_percentage_1;
        let pct2 = self.charges_percentage_2;
        let mut result = principal;
        if pct1 > Decimal::ZERO || pct2 > Decimal::ZERO {
            let pct = match (pct1 > Decimal::ZERO, pct2 > Decimal::ZERO) {
                (true, true) if self.add_on => pct2,
                (true, _) => pct1,
                _ => pct2,
            };
            result = percent_of(principal, pct);
        }
        if self.charges_divisor > Decimal::ZERO && result > Decimal::ZERO {
            result = result / self.charges_divisor * self.charges_amount;
        }
        let terms = Decimal::from(terms);
        result = match self.number_of_months {
            0 if self.anum => result / Decimal::from(12),
            -1 => result * terms / Decimal::from(12),
            n if n > 0 => result * terms / Decimal::from(n),
            _ => result,
        };
        round_money(result)
    }
}

/// Everything the builder needs about a loan beyond principal and term.
#[derive(Debug, Clone)]
pub struct LoanPolicy {
    /// Validated computation policy of the loan account.
    pub policy: AccountPolicy,
    /// Accounts posted to.
    pub accounts: LoanAccounts,
    /// Automatic deductions, in configured order.
    pub automatic_deductions: Vec<AutomaticLoanDeduction>,
    /// Charges rate schemes, in configured order.
    pub charges_schemes: Vec<ChargesRateScheme>,
    /// Borrower's member type, for charges scheme filters.
    pub member_type_id: Option<MemberTypeId>,
    /// Release date.
    pub released_on: NaiveDate,
    /// Outstanding balance of a loan being renewed.
    pub previous_balance: Decimal,
}

/// One period of an amortization schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    /// Period number, starting at 1.
    pub number: u32,
    /// Days from release to the due date.
    pub due_in_days: u32,
    /// Principal due.
    pub principal: Decimal,
    /// Interest due.
    pub interest: Decimal,
    /// Principal balance after the period.
    pub balance: Decimal,
}

impl AmortizationPeriod {
    /// Amount due for the period.
    #[must_use]
    pub fn amortization(&self) -> Decimal {
        self.principal + self.interest
    }
}

/// A balanced loan entry set with its schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanEntrySet {
    /// Entries in fixed order; the last one is the cash release line.
    pub entries: Vec<LoanTransactionEntry>,
    /// Amortization schedule.
    pub schedule: Vec<AmortizationPeriod>,
    /// Principal released.
    pub principal: Decimal,
    /// Total interest over the term.
    pub total_interest: Decimal,
    /// Total netted from proceeds.
    pub total_deductions: Decimal,
    /// Cash released to the borrower.
    pub proceeds: Decimal,
}

impl LoanEntrySet {
    /// Total debits.
    #[must_use]
    pub fn total_debit(&self) -> Decimal {
        self.entries.iter().map(|e| e.debit).sum()
    }

    /// Total credits.
    #[must_use]
    pub fn total_credit(&self) -> Decimal {
        self.entries.iter().map(|e| e.credit).sum()
    }

    /// Entries of one kind.
    pub fn of_kind(&self, kind: LoanEntryKind) -> impl Iterator<Item = &LoanTransactionEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }
}
