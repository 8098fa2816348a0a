//! Logical financial events accepted by the ledger poster.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{
    AccountId, LoanTransactionId, MemberId, Scope, TransactionBatchId, UserId,
};

use super::entry::LedgerSource;
use super::plan::PostingLine;
use crate::amortization::{LoanAccounts, LoanEntrySet};

/// Attribution and scoping shared by every row of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Owning organization and branch.
    pub scope: Scope,
    /// Acting employee.
    pub employee_user_id: UserId,
    /// Effective date.
    pub entry_date: NaiveDate,
    /// Cashier batch the event is recorded under.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// OR/voucher reference.
    pub reference_number: Option<String>,
    /// Row description.
    pub description: String,
}

impl EventContext {
    /// Creates a context without batch or reference.
    #[must_use]
    pub fn new(scope: Scope, employee_user_id: UserId, entry_date: NaiveDate) -> Self {
        Self {
            scope,
            employee_user_id,
            entry_date,
            transaction_batch_id: None,
            reference_number: None,
            description: String::new(),
        }
    }

    /// Tags the event with a cashier batch.
    #[must_use]
    pub fn in_batch(mut self, batch_id: TransactionBatchId) -> Self {
        self.transaction_batch_id = Some(batch_id);
        self
    }

    /// Sets the reference number.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_number = Some(reference.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Allocation of a loan payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoanPaymentSplit {
    /// Applied to principal.
    pub principal: Decimal,
    /// Applied to interest receivable.
    pub interest: Decimal,
    /// Applied to fines receivable.
    pub fines: Decimal,
    /// Applied to other dues on the loan.
    pub due: Decimal,
}

impl LoanPaymentSplit {
    /// Total cash received.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.principal + self.interest + self.fines + self.due
    }
}

/// Side of a batch variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceSide {
    /// More cash handled than supposed.
    Overage,
    /// Less cash handled than supposed.
    Shortage,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Cash deposit to member savings.
    Deposit {
        /// Depositor.
        member_id: MemberId,
        /// Savings account credited.
        savings_account: AccountId,
        /// Cash account debited.
        cash_account: AccountId,
        /// Amount.
        amount: Decimal,
    },
    /// Cash withdrawal from member savings.
    Withdrawal {
        /// Member withdrawing.
        member_id: MemberId,
        /// Savings or time deposit account debited.
        savings_account: AccountId,
        /// Cash account credited.
        cash_account: AccountId,
        /// Amount.
        amount: Decimal,
    },
    /// Cash loan payment.
    LoanPayment {
        /// Borrower.
        member_id: MemberId,
        /// Cash account debited.
        cash_account: AccountId,
        /// Loan product accounts.
        accounts: LoanAccounts,
        /// Allocation of the payment.
        split: LoanPaymentSplit,
    },
    /// Manual adjustment entry.
    Adjustment {
        /// Lines as entered.
        lines: Vec<PostingLine>,
    },
    /// Journal voucher.
    Journal {
        /// Lines as entered.
        lines: Vec<PostingLine>,
    },
    /// Loan release from an amortization entry set.
    LoanDisbursement {
        /// Borrower.
        member_id: MemberId,
        /// Loan transaction the entries belong to.
        loan_transaction_id: LoanTransactionId,
        /// Loan product accounts.
        accounts: LoanAccounts,
        /// Built entries.
        entries: LoanEntrySet,
    },
    /// Check voucher drawn on a bank account.
    CheckVoucher {
        /// Payee member, if any.
        member_id: Option<MemberId>,
        /// Account debited.
        debit_account: AccountId,
        /// Bank account credited.
        bank_account: AccountId,
        /// Amount.
        amount: Decimal,
        /// Check number.
        check_number: String,
    },
    /// Cash disbursement voucher.
    CashDisbursement {
        /// Payee member, if any.
        member_id: Option<MemberId>,
        /// Account debited.
        debit_account: AccountId,
        /// Cash account credited.
        cash_account: AccountId,
        /// Amount.
        amount: Decimal,
    },
    /// Generated savings interest and its withholding tax.
    SavingsInterest {
        /// Depositor.
        member_id: MemberId,
        /// Savings account credited.
        savings_account: AccountId,
        /// Interest expense account debited.
        interest_expense_account: AccountId,
        /// Withholding tax payable account.
        tax_payable_account: AccountId,
        /// Interest amount; negative for a below-minimum charge.
        interest: Decimal,
        /// Tax withheld.
        tax: Decimal,
    },
    /// Transaction batch overage or shortage.
    BatchVariance {
        /// Member profile the variance is charged to, if configured.
        member_id: Option<MemberId>,
        /// Batch cash account.
        cash_account: AccountId,
        /// Overage or shortage suspense account.
        suspense_account: AccountId,
        /// Side of the variance.
        side: VarianceSide,
        /// Absolute variance.
        amount: Decimal,
    },
}

/// A logical financial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialEvent {
    /// Attribution and scoping.
    pub context: EventContext,
    /// What happened.
    pub kind: EventKind,
}

impl FinancialEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(context: EventContext, kind: EventKind) -> Self {
        Self { context, kind }
    }

    /// Ledger source of the rows this event produces.
    #[must_use]
    pub fn source(&self) -> LedgerSource {
        match self.kind {
            EventKind::Deposit { .. } => LedgerSource::Deposit,
            EventKind::Withdrawal { .. } => LedgerSource::Withdraw,
            EventKind::LoanPayment { .. } => LedgerSource::Payment,
            EventKind::Adjustment { .. } => LedgerSource::Adjustment,
            EventKind::Journal { .. } => LedgerSource::Journal,
            EventKind::LoanDisbursement { .. } => LedgerSource::Loan,
            EventKind::CheckVoucher { .. } => LedgerSource::CheckVoucher,
            EventKind::CashDisbursement { .. } => LedgerSource::Disbursement,
            EventKind::SavingsInterest { .. } => LedgerSource::SavingsInterest,
            EventKind::BatchVariance { .. } => LedgerSource::BatchVariance,
        }
    }

    /// Batch the event is tagged with.
    #[must_use]
    pub fn batch_id(&self) -> Option<TransactionBatchId> {
        self.context.transaction_batch_id
    }
}
