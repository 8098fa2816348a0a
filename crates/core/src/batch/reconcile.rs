//! Batch totals, classification and variance events.
//!
//! The supposed remittance is the beginning balance plus the net movement
//! of the batch cash account in ledger rows tagged with the batch. The cash
//! handled is what the cashier actually turns over: counted cash, deposits
//! in bank, and check and online remittances.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{AccountId, TransactionId, UserId};

use super::types::{
    RemittanceKind, TransactionBatch, TransactionBatchBalanceStatus, UnbalancedAccount,
};
use crate::posting::{
    AccountKind, EventContext, EventKind, FinancialEvent, GeneralLedgerRow, LedgerSource,
    VarianceSide,
};

/// Frozen totals of a batch close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchTotals {
    /// Σ batch fundings.
    pub beginning_balance: Decimal,
    /// Σ denomination × quantity.
    pub cash_count_total: Decimal,
    /// Cash deposited in bank during the session.
    pub deposit_in_bank: Decimal,
    /// Σ check remittances.
    pub check_remittance: Decimal,
    /// Σ online remittances.
    pub online_remittance: Decimal,
    /// Cash received for savings deposits.
    pub total_deposit_entry: Decimal,
    /// Cash received for loan payments.
    pub total_cash_collection: Decimal,
    /// Cash paid for savings withdrawals.
    pub savings_withdrawal: Decimal,
    /// Cash paid for time deposit withdrawals.
    pub time_deposit_withdrawal: Decimal,
    /// Cash paid for loan releases.
    pub loan_releases: Decimal,
    /// Cash paid for disbursement vouchers.
    pub petty_cash: Decimal,
    /// Σ check vouchers issued under the batch.
    pub cash_check_voucher_total: Decimal,
    /// Net cash movement from adjustments, journals and other sources.
    pub other_cash_movement: Decimal,
    /// What the cashier turned over.
    pub total_cash_handled: Decimal,
    /// What the ledger says should have been turned over.
    pub total_supposed_remittance: Decimal,
}

impl BatchTotals {
    /// Computes the totals of `batch` from its recorded counts and the
    /// ledger rows tagged with it.
    ///
    /// Rows of other batches and earlier variance postings are ignored.
    /// `kind_of` classifies the sibling accounts of withdrawal rows so that
    /// time deposit withdrawals are totalled separately.
    #[must_use]
    pub fn compute<F>(
        batch: &TransactionBatch,
        rows: &[GeneralLedgerRow],
        cash_account: AccountId,
        kind_of: F,
    ) -> Self
    where
        F: Fn(AccountId) -> Option<AccountKind>,
    {
        let rows: Vec<&GeneralLedgerRow> = rows
            .iter()
            .filter(|r| {
                r.transaction_batch_id == Some(batch.id) && r.source != LedgerSource::BatchVariance
            })
            .collect();

        let time_deposit_txns: BTreeSet<TransactionId> = rows
            .iter()
            .filter(|r| r.source == LedgerSource::Withdraw)
            .filter(|r| kind_of(r.account_id) == Some(AccountKind::TimeDeposit))
            .map(|r| r.transaction_id)
            .collect();

        let mut totals = Self {
            beginning_balance: batch.beginning_balance(),
            cash_count_total: batch.cash_count_total(),
            deposit_in_bank: batch.deposit_in_bank(),
            check_remittance: batch.remittance_total(RemittanceKind::Check),
            online_remittance: batch.remittance_total(RemittanceKind::Online),
            ..Self::default()
        };

        for row in &rows {
            if row.source == LedgerSource::CheckVoucher && row.account_id != cash_account {
                totals.cash_check_voucher_total += row.credit;
            }
            if row.account_id != cash_account {
                continue;
            }
            let change = row.debit - row.credit;
            match row.source {
                LedgerSource::Deposit => totals.total_deposit_entry += change,
                LedgerSource::Payment => totals.total_cash_collection += change,
                LedgerSource::Withdraw if time_deposit_txns.contains(&row.transaction_id) => {
                    totals.time_deposit_withdrawal -= change;
                }
                LedgerSource::Withdraw => totals.savings_withdrawal -= change,
                LedgerSource::Loan => totals.loan_releases -= change,
                LedgerSource::Disbursement => totals.petty_cash -= change,
                _ => totals.other_cash_movement += change,
            }
        }

        totals.total_cash_handled = totals.cash_count_total
            + totals.deposit_in_bank
            + totals.check_remittance
            + totals.online_remittance;
        totals.total_supposed_remittance = totals.beginning_balance + totals.net_cash_movement();
        totals
    }

    /// Net movement of the cash account under the batch.
    #[must_use]
    pub fn net_cash_movement(&self) -> Decimal {
        self.total_deposit_entry + self.total_cash_collection + self.other_cash_movement
            - self.savings_withdrawal
            - self.time_deposit_withdrawal
            - self.loan_releases
            - self.petty_cash
    }

    /// Cash handled minus supposed remittance.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.total_cash_handled - self.total_supposed_remittance
    }

    /// Balance status of the totals.
    #[must_use]
    pub fn status(&self) -> TransactionBatchBalanceStatus {
        classify(self.total_cash_handled, self.total_supposed_remittance)
    }
}

/// Classifies a batch by exact decimal comparison.
#[must_use]
pub fn classify(handled: Decimal, supposed: Decimal) -> TransactionBatchBalanceStatus {
    match handled.cmp(&supposed) {
        std::cmp::Ordering::Equal => TransactionBatchBalanceStatus::Balanced,
        std::cmp::Ordering::Greater => TransactionBatchBalanceStatus::Overage,
        std::cmp::Ordering::Less => TransactionBatchBalanceStatus::Shortage,
    }
}

/// The event that moves a batch variance into its suspense account, or
/// `None` for a balanced batch.
///
/// Overage debits cash and credits the overage account; shortage debits the
/// shortage account and credits cash. The amount is the absolute difference.
#[must_use]
pub fn variance_event(
    batch: &TransactionBatch,
    totals: &BatchTotals,
    unbalanced: &UnbalancedAccount,
    employee_user_id: UserId,
) -> Option<FinancialEvent> {
    let (side, suspense_account, member_id, label) = match totals.status() {
        TransactionBatchBalanceStatus::Balanced => return None,
        TransactionBatchBalanceStatus::Overage => (
            VarianceSide::Overage,
            unbalanced.account_for_overage,
            unbalanced.member_profile_for_overage,
            "overage",
        ),
        TransactionBatchBalanceStatus::Shortage => (
            VarianceSide::Shortage,
            unbalanced.account_for_shortage,
            unbalanced.member_profile_for_shortage,
            "shortage",
        ),
    };
    let context = EventContext::new(batch.scope, employee_user_id, batch.batch_date)
        .in_batch(batch.id)
        .with_description(format!("Transaction batch {label}"));
    Some(FinancialEvent::new(
        context,
        EventKind::BatchVariance {
            member_id,
            cash_account: unbalanced.cash_account,
            suspense_account,
            side,
            amount: totals.difference().abs(),
        },
    ))
}
