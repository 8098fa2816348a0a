//! Loan entry set construction.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use coopledger_shared::types::{AccountId, percent_of, round_money};

use super::error::AmortizationError;
use super::types::{
    AmortizationPeriod, LoanEntryKind, LoanEntrySet, LoanPolicy, LoanTransactionEntry,
};
use crate::rates::{
    ChargeContext, ComputationPolicy, LoanModeOfPayment, LumpsumComputation, RateQuery,
    RateResolver, compute_interest, compute_straight_interest, number_of_payments,
};

/// Days per loan year in schedule arithmetic (twelve 30-day months).
const DAYS_PER_LOAN_YEAR: u32 = 360;

/// Appends entries in order and tracks what is netted from proceeds.
#[derive(Debug, Default)]
struct EntryWriter {
    entries: Vec<LoanTransactionEntry>,
    netted: Decimal,
}

impl EntryWriter {
    fn push(
        &mut self,
        kind: LoanEntryKind,
        account_id: AccountId,
        member_ledger: bool,
        description: String,
        debit: Decimal,
        credit: Decimal,
    ) {
        if debit.is_zero() && credit.is_zero() {
            return;
        }
        let entry = LoanTransactionEntry {
            index: u32::try_from(self.entries.len()).unwrap_or(u32::MAX),
            kind,
            account_id,
            member_ledger,
            description,
            debit,
            credit,
        };
        if entry.is_netted() {
            self.netted += entry.credit;
        }
        self.entries.push(entry);
    }

    fn debit(&mut self, kind: LoanEntryKind, account_id: AccountId, member_ledger: bool, description: impl Into<String>, amount: Decimal) {
        self.push(kind, account_id, member_ledger, description.into(), amount, Decimal::ZERO);
    }

    fn credit(&mut self, kind: LoanEntryKind, account_id: AccountId, member_ledger: bool, description: impl Into<String>, amount: Decimal) {
        self.push(kind, account_id, member_ledger, description.into(), Decimal::ZERO, amount);
    }

    fn net(&self) -> Decimal {
        self.entries.iter().map(LoanTransactionEntry::signed).sum()
    }
}

/// Builds the ordered entry set and schedule for a loan release.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmortizationBuilder {
    resolver: RateResolver,
}

impl AmortizationBuilder {
    /// Creates a builder using the given resolver.
    #[must_use]
    pub const fn new(resolver: RateResolver) -> Self {
        Self { resolver }
    }

    /// Builds the entry set for releasing `principal` over `term_count` months.
    ///
    /// Entries come in fixed order: principal, interest, automatic
    /// deductions, charges, lumpsum add-ons, previous balance, and finally
    /// the cash line carrying the proceeds. Nothing is returned unless the
    /// set nets to the proceeds and balances.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrincipal`, a rate error, `DeductionsExceedPrincipal`
    /// or `AmortizationImbalance`.
    pub fn build_entries(
        &self,
        loan: &LoanPolicy,
        principal: Decimal,
        term_count: u32,
        mode: LoanModeOfPayment,
    ) -> Result<LoanEntrySet, AmortizationError> {
        if principal <= Decimal::ZERO {
            return Err(AmortizationError::InvalidPrincipal(principal));
        }
        let payments = number_of_payments(mode, term_count)?;
        let (mut schedule, interest_calls) =
            self.schedule(loan, principal, term_count, payments, mode)?;
        let total_interest: Decimal = interest_calls.iter().sum();
        let accounts = &loan.accounts;
        let mut writer = EntryWriter::default();

        writer.debit(LoanEntryKind::Static, accounts.loan_receivable, true, "Loan principal", principal);

        match loan.policy.lumpsum {
            LumpsumComputation::AdvanceInterest => {
                for (n, interest) in interest_calls.iter().enumerate() {
                    writer.credit(
                        LoanEntryKind::Deduction,
                        accounts.interest_income,
                        false,
                        format!("Advance interest {}", n + 1),
                        *interest,
                    );
                }
                for period in &mut schedule {
                    period.interest = Decimal::ZERO;
                }
            }
            LumpsumComputation::InterestMaturity => {
                writer.debit(LoanEntryKind::AddOn, accounts.interest_receivable, true, "Interest due at maturity", total_interest);
                writer.credit(LoanEntryKind::AddOn, accounts.unearned_interest, false, "Unearned interest", total_interest);
                let last = schedule.len().saturating_sub(1);
                for (i, period) in schedule.iter_mut().enumerate() {
                    period.interest = if i == last { total_interest } else { Decimal::ZERO };
                }
            }
            LumpsumComputation::None | LumpsumComputation::FinesMaturity => {
                for (n, interest) in interest_calls.iter().enumerate() {
                    writer.debit(
                        LoanEntryKind::AddOn,
                        accounts.interest_receivable,
                        true,
                        format!("Interest {}", n + 1),
                        *interest,
                    );
                }
                writer.credit(LoanEntryKind::AddOn, accounts.unearned_interest, false, "Unearned interest", total_interest);
            }
        }

        for deduction in &loan.automatic_deductions {
            let amount = deduction.amount(principal, term_count);
            if deduction.add_on {
                writer.debit(LoanEntryKind::AddOn, accounts.loan_receivable, true, deduction.name.clone(), amount);
                writer.credit(LoanEntryKind::AddOn, deduction.account_id, false, deduction.name.clone(), amount);
            } else {
                writer.credit(LoanEntryKind::AutomaticDeduction, deduction.account_id, false, deduction.name.clone(), amount);
            }
        }

        let charge_ctx = ChargeContext {
            principal,
            terms: term_count,
            mode_of_payment: mode,
            member_type_id: loan.member_type_id,
        };
        for scheme in &loan.charges_schemes {
            let amount = self.resolver.resolve_charge(scheme, &charge_ctx)?;
            writer.credit(LoanEntryKind::Deduction, scheme.account_id, false, scheme.name.clone(), amount);
        }

        if loan.policy.lumpsum == LumpsumComputation::FinesMaturity {
            let fines = self.maturity_fines(loan, principal, term_count, mode)?;
            writer.debit(LoanEntryKind::AddOn, accounts.fines_receivable, true, "Fines due at maturity", fines);
            writer.credit(LoanEntryKind::AddOn, accounts.unearned_fines, false, "Unearned fines", fines);
        }

        if loan.previous_balance > Decimal::ZERO {
            writer.credit(LoanEntryKind::Previous, accounts.loan_receivable, true, "Previous loan balance", loan.previous_balance);
        }

        let deductions = writer.netted;
        let proceeds = principal - deductions;
        if proceeds <= Decimal::ZERO {
            return Err(AmortizationError::DeductionsExceedPrincipal {
                principal,
                deductions,
            });
        }
        let actual = writer.net();
        if actual != proceeds {
            return Err(AmortizationError::AmortizationImbalance {
                expected: proceeds,
                actual,
            });
        }

        writer.credit(LoanEntryKind::Static, accounts.cash, false, "Loan proceeds", proceeds);
        let residual = writer.net();
        if !residual.is_zero() {
            return Err(AmortizationError::AmortizationImbalance {
                expected: Decimal::ZERO,
                actual: residual,
            });
        }

        Ok(LoanEntrySet {
            entries: writer.entries,
            schedule,
            principal,
            total_interest,
            total_deductions: deductions,
            proceeds,
        })
    }

    /// Per-period schedule plus the interest amount of each resolver call.
    fn schedule(
        &self,
        loan: &LoanPolicy,
        principal: Decimal,
        term_count: u32,
        payments: u32,
        mode: LoanModeOfPayment,
    ) -> Result<(Vec<AmortizationPeriod>, Vec<Decimal>), AmortizationError> {
        let policy = &loan.policy;
        let query = RateQuery::interest(loan.released_on, principal, term_count, mode);
        let term_days = term_count.saturating_mul(30);
        let period_days = if mode == LoanModeOfPayment::Lumpsum {
            term_days
        } else {
            mode.days_per_period()
        };
        let count = Decimal::from(payments);
        let principal_share = round_money(principal / count);

        let mut periods = Vec::new();
        let mut calls = Vec::new();
        let mut balance = principal;

        if policy.computation == ComputationPolicy::Straight {
            let rate = self.resolver.assess(policy, &query.at(term_days, principal))?;
            let total = compute_straight_interest(principal, &rate, term_count);
            calls.push(total);
            let interest_share = round_money(total / count);
            let mut interest_left = total;
            for number in 1..=payments {
                let last = number == payments;
                let principal_due = if last { balance } else { principal_share.min(balance) };
                let interest_due = if last { interest_left } else { interest_share.min(interest_left) };
                balance -= principal_due;
                interest_left -= interest_due;
                periods.push(AmortizationPeriod {
                    number,
                    due_in_days: number.saturating_mul(period_days),
                    principal: principal_due,
                    interest: interest_due,
                    balance,
                });
            }
            return Ok((periods, calls));
        }

        let yearly = matches!(policy.computation, ComputationPolicy::DiminishingStraight(_));
        let mut year = 0;
        let mut year_balance = principal;
        for number in 1..=payments {
            let start_day = (number - 1).saturating_mul(period_days);
            if start_day / DAYS_PER_LOAN_YEAR != year {
                year = start_day / DAYS_PER_LOAN_YEAR;
                year_balance = balance;
            }
            let due_in_days = number.saturating_mul(period_days);
            let base = if yearly { year_balance } else { balance };
            let rate = self.resolver.assess(policy, &query.at(due_in_days, base))?;
            let interest = compute_interest(base, &rate);
            let principal_due = if number == payments { balance } else { principal_share.min(balance) };
            balance -= principal_due;
            calls.push(interest);
            periods.push(AmortizationPeriod {
                number,
                due_in_days,
                principal: principal_due,
                interest,
                balance,
            });
        }
        Ok((periods, calls))
    }

    /// Fines accrued at release for `FinesMaturity` loans: one maturity
    /// fines period on the principal.
    fn maturity_fines(
        &self,
        loan: &LoanPolicy,
        principal: Decimal,
        term_count: u32,
        mode: LoanModeOfPayment,
    ) -> Result<Decimal, AmortizationError> {
        let term_days = term_count.saturating_mul(30);
        let maturity: NaiveDate = loan
            .released_on
            .checked_add_days(Days::new(u64::from(term_days)))
            .unwrap_or(loan.released_on);
        let query = RateQuery::fines(maturity, principal, term_days, mode, true);
        let rate = self.resolver.assess(&loan.policy, &query)?;
        Ok(round_money(percent_of(principal, rate.period)))
    }
}
