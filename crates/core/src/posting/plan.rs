//! Posting plans: the balanced lines an event produces and the rows they become.
//!
//! A plan is pure. The ledger poster in the store crate reads the current
//! member accounting ledgers, calls [`PostingPlan::apply`] on a copy, and
//! commits the resulting rows only if every key's version is unchanged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{AccountId, GeneralLedgerId, MemberId, TransactionId};

use super::account::AccountInfo;
use super::balance::{LedgerComponent, MemberAccountingLedger, signed_change};
use super::entry::{EntryType, GeneralLedgerRow, LedgerKey, LedgerSource};
use super::error::PostingError;
use super::event::{EventContext, EventKind, FinancialEvent, VarianceSide};
use super::validation::{PostingTotals, validate_lines};
use crate::amortization::{LoanAccounts, LoanEntryKind, LoanEntrySet, LoanTransactionEntry};

/// One side of a posting, before running balances are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingLine {
    /// Account posted to.
    pub account_id: AccountId,
    /// Member subsidiary ledger, if any.
    pub member_id: Option<MemberId>,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Positive amount, rounded to cents.
    pub amount: Decimal,
    /// Member ledger accumulator fed by the line.
    #[serde(default)]
    pub component: LedgerComponent,
    /// Overrides the event description on the row.
    #[serde(default)]
    pub description: Option<String>,
}

impl PostingLine {
    fn new(account_id: AccountId, entry_type: EntryType, amount: Decimal) -> Self {
        Self {
            account_id,
            member_id: None,
            entry_type,
            amount,
            component: LedgerComponent::Principal,
            description: None,
        }
    }

    /// A debit line on a GL-level account.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, EntryType::Debit, amount)
    }

    /// A credit line on a GL-level account.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, EntryType::Credit, amount)
    }

    /// Posts the line to a member's subsidiary ledger.
    #[must_use]
    pub fn for_member(mut self, member_id: MemberId) -> Self {
        self.member_id = Some(member_id);
        self
    }

    /// Posts the line to an optional member's subsidiary ledger.
    #[must_use]
    pub fn for_member_opt(mut self, member_id: Option<MemberId>) -> Self {
        self.member_id = member_id;
        self
    }

    /// Sets the member ledger accumulator.
    #[must_use]
    pub fn component(mut self, component: LedgerComponent) -> Self {
        self.component = component;
        self
    }

    /// Sets the row description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Running balance key of the line.
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.member_id, self.account_id)
    }

    /// Debit amount, zero on a credit line.
    #[must_use]
    pub fn debit_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => Decimal::ZERO,
        }
    }

    /// Credit amount, zero on a debit line.
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => Decimal::ZERO,
            EntryType::Credit => self.amount,
        }
    }
}

/// The validated, balanced lines of one event under one transaction ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingPlan {
    /// Transaction ID shared by every row.
    pub transaction_id: TransactionId,
    /// Attribution and scoping.
    pub context: EventContext,
    /// Ledger source of the rows.
    pub source: LedgerSource,
    /// Lines in posting order.
    pub lines: Vec<PostingLine>,
    totals: PostingTotals,
}

impl PostingPlan {
    /// Expands an event into balanced lines.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the lines do not balance exactly or
    /// an amount is zero, negative or unrounded.
    pub fn from_event(event: &FinancialEvent) -> Result<Self, PostingError> {
        let lines = lines_for(&event.kind)?;
        let totals = validate_lines(&lines)?;
        Ok(Self {
            transaction_id: TransactionId::new(),
            context: event.context.clone(),
            source: event.source(),
            lines,
            totals,
        })
    }

    /// Debit and credit totals.
    #[must_use]
    pub fn totals(&self) -> PostingTotals {
        self.totals
    }

    /// Distinct running balance keys, in lock order.
    #[must_use]
    pub fn keys(&self) -> Vec<LedgerKey> {
        self.lines
            .iter()
            .map(PostingLine::key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct accounts referenced.
    #[must_use]
    pub fn accounts(&self) -> Vec<AccountId> {
        self.lines
            .iter()
            .map(|l| l.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Looks up every referenced account.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` for the first account the lookup cannot find.
    pub fn resolve_accounts<F>(&self, lookup: F) -> Result<BTreeMap<AccountId, AccountInfo>, PostingError>
    where
        F: Fn(AccountId) -> Option<AccountInfo>,
    {
        self.accounts()
            .into_iter()
            .map(|id| {
                lookup(id)
                    .map(|info| (id, info))
                    .ok_or(PostingError::UnknownAccount(id))
            })
            .collect()
    }

    /// Applies the lines to the given ledgers and returns the rows to insert.
    ///
    /// Missing ledgers start at version 0. Each row carries the key's running
    /// balance and version after it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` if a line's account is not in `accounts`.
    pub fn apply(
        &self,
        ledgers: &mut BTreeMap<LedgerKey, MemberAccountingLedger>,
        accounts: &BTreeMap<AccountId, AccountInfo>,
        now: DateTime<Utc>,
    ) -> Result<Vec<GeneralLedgerRow>, PostingError> {
        let ctx = &self.context;
        let marks_payment = matches!(self.source, LedgerSource::Deposit | LedgerSource::Payment);
        let mut rows = Vec::with_capacity(self.lines.len());

        for line in &self.lines {
            if !accounts.contains_key(&line.account_id) {
                return Err(PostingError::UnknownAccount(line.account_id));
            }
            let key = line.key();
            let ledger = ledgers
                .entry(key)
                .or_insert_with(|| MemberAccountingLedger::new(ctx.scope, key));

            let debit = line.debit_amount();
            let credit = line.credit_amount();
            let running = ledger.apply(signed_change(debit, credit), line.component);
            if marks_payment && key.member_id.is_some() {
                ledger.last_pay = Some(ctx.entry_date);
            }

            rows.push(GeneralLedgerRow {
                id: GeneralLedgerId::new(),
                scope: ctx.scope,
                transaction_id: self.transaction_id,
                transaction_batch_id: ctx.transaction_batch_id,
                member_id: line.member_id,
                account_id: line.account_id,
                source: self.source,
                entry_date: ctx.entry_date,
                debit,
                credit,
                balance: running.current_balance,
                ledger_version: running.ledger_version,
                employee_user_id: ctx.employee_user_id,
                reference_number: ctx.reference_number.clone(),
                description: line.description.clone().unwrap_or_else(|| ctx.description.clone()),
                created_at: now,
            });
        }

        Ok(rows)
    }
}

fn lines_for(kind: &EventKind) -> Result<Vec<PostingLine>, PostingError> {
    let lines = match kind {
        EventKind::Deposit {
            member_id,
            savings_account,
            cash_account,
            amount,
        } => vec![
            PostingLine::debit(*cash_account, *amount),
            PostingLine::credit(*savings_account, *amount).for_member(*member_id),
        ],
        EventKind::Withdrawal {
            member_id,
            savings_account,
            cash_account,
            amount,
        } => vec![
            PostingLine::debit(*savings_account, *amount).for_member(*member_id),
            PostingLine::credit(*cash_account, *amount),
        ],
        EventKind::LoanPayment {
            member_id,
            cash_account,
            accounts,
            split,
        } => {
            let parts = [
                (accounts.loan_receivable, split.principal, LedgerComponent::Principal),
                (accounts.interest_receivable, split.interest, LedgerComponent::Interest),
                (accounts.fines_receivable, split.fines, LedgerComponent::Fines),
                (accounts.loan_receivable, split.due, LedgerComponent::Due),
            ];
            let mut lines = vec![PostingLine::debit(*cash_account, split.total())];
            lines.extend(parts.into_iter().filter(|(_, amount, _)| !amount.is_zero()).map(
                |(account, amount, component)| {
                    PostingLine::credit(account, amount)
                        .for_member(*member_id)
                        .component(component)
                },
            ));
            lines
        }
        EventKind::Adjustment { lines } | EventKind::Journal { lines } => lines.clone(),
        EventKind::LoanDisbursement {
            member_id,
            accounts,
            entries,
            ..
        } => disbursement_lines(*member_id, accounts, entries)?,
        EventKind::CheckVoucher {
            member_id,
            debit_account,
            bank_account,
            amount,
            check_number,
        } => vec![
            PostingLine::debit(*debit_account, *amount).for_member_opt(*member_id),
            PostingLine::credit(*bank_account, *amount).describe(format!("Check #{check_number}")),
        ],
        EventKind::CashDisbursement {
            member_id,
            debit_account,
            cash_account,
            amount,
        } => vec![
            PostingLine::debit(*debit_account, *amount).for_member_opt(*member_id),
            PostingLine::credit(*cash_account, *amount),
        ],
        EventKind::SavingsInterest {
            member_id,
            savings_account,
            interest_expense_account,
            tax_payable_account,
            interest,
            tax,
        } => {
            let mut lines = Vec::with_capacity(4);
            if *interest > Decimal::ZERO {
                lines.push(PostingLine::debit(*interest_expense_account, *interest));
                lines.push(
                    PostingLine::credit(*savings_account, *interest)
                        .for_member(*member_id)
                        .component(LedgerComponent::Interest),
                );
            } else if *interest < Decimal::ZERO {
                // Below-minimum charge reverses the sides.
                let charge = interest.abs();
                lines.push(
                    PostingLine::debit(*savings_account, charge)
                        .for_member(*member_id)
                        .component(LedgerComponent::Interest)
                        .describe("Below minimum balance charge"),
                );
                lines.push(PostingLine::credit(*interest_expense_account, charge));
            }
            if !tax.is_zero() {
                lines.push(
                    PostingLine::debit(*savings_account, *tax)
                        .for_member(*member_id)
                        .describe("Withholding tax on interest"),
                );
                lines.push(PostingLine::credit(*tax_payable_account, *tax));
            }
            lines
        }
        EventKind::BatchVariance {
            member_id,
            cash_account,
            suspense_account,
            side,
            amount,
        } => match side {
            VarianceSide::Overage => vec![
                PostingLine::debit(*cash_account, *amount),
                PostingLine::credit(*suspense_account, *amount).for_member_opt(*member_id),
            ],
            VarianceSide::Shortage => vec![
                PostingLine::debit(*suspense_account, *amount).for_member_opt(*member_id),
                PostingLine::credit(*cash_account, *amount),
            ],
        },
    };
    Ok(lines)
}

fn disbursement_lines(
    member_id: MemberId,
    accounts: &LoanAccounts,
    set: &LoanEntrySet,
) -> Result<Vec<PostingLine>, PostingError> {
    set.entries
        .iter()
        .map(|entry| {
            let line = match (entry.debit.is_zero(), entry.credit.is_zero()) {
                (false, true) => PostingLine::debit(entry.account_id, entry.debit),
                (true, false) => PostingLine::credit(entry.account_id, entry.credit),
                _ => return Err(PostingError::InvalidEntry { index: entry.index }),
            };
            let line = if entry.member_ledger {
                line.for_member(member_id)
            } else {
                line
            };
            Ok(line
                .component(disbursement_component(accounts, entry))
                .describe(entry.description.clone()))
        })
        .collect()
}

fn disbursement_component(accounts: &LoanAccounts, entry: &LoanTransactionEntry) -> LedgerComponent {
    if entry.account_id == accounts.interest_receivable {
        LedgerComponent::Interest
    } else if entry.account_id == accounts.fines_receivable {
        LedgerComponent::Fines
    } else if entry.account_id == accounts.loan_receivable && entry.kind == LoanEntryKind::AddOn {
        LedgerComponent::Due
    } else {
        LedgerComponent::Principal
    }
}
