//! Batch close and reconciliation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashSet;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use coopledger_core::batch::{
    BatchError, BatchTotals, Remittance, TransactionBatch, TransactionBatchBalanceStatus,
    select_unbalanced_account, variance_event,
};
use coopledger_core::posting::GeneralLedgerRow;
use coopledger_shared::types::{AccountId, Scope, TransactionBatchId, UserId};

use crate::locks::LockMap;
use crate::poster::LedgerPoster;
use crate::traits::LedgerStore;

/// Outcome of closing a batch.
#[derive(Debug, Clone)]
pub struct BatchCloseReport {
    /// The closed batch.
    pub batch: TransactionBatch,
    /// Frozen totals.
    pub totals: BatchTotals,
    /// Balance status.
    pub status: TransactionBatchBalanceStatus,
    /// Rows of the variance posting; empty for a balanced batch.
    pub variance_rows: Vec<GeneralLedgerRow>,
}

/// Opens, records against and closes cashier batches.
pub struct BatchReconciler<S> {
    poster: Arc<LedgerPoster<S>>,
    closing: DashSet<TransactionBatchId>,
    batch_locks: LockMap<TransactionBatchId>,
}

struct ClosingGuard<'a> {
    closing: &'a DashSet<TransactionBatchId>,
    id: TransactionBatchId,
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        self.closing.remove(&self.id);
    }
}

impl<S: LedgerStore> BatchReconciler<S> {
    /// Creates a reconciler posting through `poster`.
    #[must_use]
    pub fn new(poster: Arc<LedgerPoster<S>>) -> Self {
        Self {
            poster,
            closing: DashSet::new(),
            batch_locks: LockMap::new(),
        }
    }

    /// Opens and stores a batch.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn open_batch(
        &self,
        scope: Scope,
        employee_user_id: UserId,
        currency: &str,
        batch_date: NaiveDate,
    ) -> Result<TransactionBatch, BatchError> {
        let batch = TransactionBatch::open(scope, employee_user_id, currency, batch_date);
        self.poster.store().save_batch(batch.clone()).await?;
        info!(batch_id = %batch.id, employee_user_id = %employee_user_id, "Transaction batch opened");
        Ok(batch)
    }

    /// Records a cash count line.
    ///
    /// # Errors
    ///
    /// `UnknownBatch`, a state error unless the batch is open, or
    /// `InvalidCashCount`.
    pub async fn record_cash_count(
        &self,
        batch_id: TransactionBatchId,
        denomination: Decimal,
        quantity: i64,
    ) -> Result<(), BatchError> {
        self.update(batch_id, |b| b.add_cash_count(denomination, quantity))
            .await
    }

    /// Records beginning-balance funding.
    ///
    /// # Errors
    ///
    /// `UnknownBatch`, a state error, or `InvalidAmount`.
    pub async fn record_funding(
        &self,
        batch_id: TransactionBatchId,
        amount: Decimal,
    ) -> Result<(), BatchError> {
        self.update(batch_id, |b| b.add_funding(amount)).await
    }

    /// Records cash deposited in the bank.
    ///
    /// # Errors
    ///
    /// `UnknownBatch`, a state error, or `InvalidAmount`.
    pub async fn record_deposit_in_bank(
        &self,
        batch_id: TransactionBatchId,
        amount: Decimal,
    ) -> Result<(), BatchError> {
        self.update(batch_id, |b| b.add_deposit_in_bank(amount)).await
    }

    /// Records a check or online remittance.
    ///
    /// # Errors
    ///
    /// `UnknownBatch`, a state error, or `InvalidAmount`.
    pub async fn record_remittance(
        &self,
        batch_id: TransactionBatchId,
        remittance: Remittance,
    ) -> Result<(), BatchError> {
        self.update(batch_id, |b| b.add_remittance(remittance)).await
    }

    /// Closes a batch.
    ///
    /// The batch moves to closing first, so no further rows can be tagged
    /// with it. Totals are computed from the rows tagged with the batch,
    /// any variance is posted to the branch's unbalanced accounts, and the
    /// batch is closed with frozen totals. If anything fails before the
    /// close is recorded, the batch returns to open and no variance is
    /// posted.
    ///
    /// # Errors
    ///
    /// - `AlreadyClosing` while another close of the batch is running
    /// - `UnknownBatch`, or `BatchClosed` for a closed batch
    /// - `MissingUnbalancedAccount` or `DuplicateUnbalancedAccount`
    /// - `Posting` when the variance cannot be posted
    #[instrument(name = "batch.close", skip(self), err)]
    pub async fn close(
        &self,
        batch_id: TransactionBatchId,
        employee_user_id: UserId,
    ) -> Result<BatchCloseReport, BatchError> {
        if !self.closing.insert(batch_id) {
            return Err(BatchError::AlreadyClosing(batch_id));
        }
        let _closing = ClosingGuard {
            closing: &self.closing,
            id: batch_id,
        };
        let _held = self.batch_locks.lock(batch_id).await;

        let store = self.poster.store();
        let mut batch = store
            .batch(batch_id)
            .await?
            .ok_or(BatchError::UnknownBatch(batch_id))?;
        batch.begin_close()?;
        store.save_batch(batch.clone()).await?;

        let (totals, variance_rows) = match self.settle(&batch, employee_user_id).await {
            Ok(settled) => settled,
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "Batch close failed, reopening");
                batch.abort_close();
                store.save_batch(batch).await?;
                return Err(err);
            }
        };

        batch.finish_close(totals, Utc::now())?;
        store.save_batch(batch.clone()).await?;

        let status = totals.status();
        info!(
            batch_id = %batch_id,
            status = %status,
            cash_handled = %totals.total_cash_handled,
            supposed_remittance = %totals.total_supposed_remittance,
            "Transaction batch closed"
        );
        Ok(BatchCloseReport {
            batch,
            totals,
            status,
            variance_rows,
        })
    }

    async fn settle(
        &self,
        batch: &TransactionBatch,
        employee_user_id: UserId,
    ) -> Result<(BatchTotals, Vec<GeneralLedgerRow>), BatchError> {
        let store = self.poster.store();
        let configured = store.unbalanced_accounts(batch.scope).await?;
        let unbalanced = select_unbalanced_account(&configured, batch.scope, &batch.currency)?;

        let rows = store.rows_for_batch(batch.id).await?;
        let account_ids: BTreeSet<AccountId> = rows.iter().map(|r| r.account_id).collect();
        let mut kinds = HashMap::with_capacity(account_ids.len());
        for id in account_ids {
            if let Some(info) = store.account(id).await? {
                kinds.insert(id, info.kind);
            }
        }

        let totals = BatchTotals::compute(batch, &rows, unbalanced.cash_account, |id| {
            kinds.get(&id).copied()
        });
        let variance_rows = match variance_event(batch, &totals, unbalanced, employee_user_id) {
            Some(event) => self.poster.post(&event).await?,
            None => Vec::new(),
        };
        Ok((totals, variance_rows))
    }

    async fn update<F>(&self, batch_id: TransactionBatchId, apply: F) -> Result<(), BatchError>
    where
        F: FnOnce(&mut TransactionBatch) -> Result<(), BatchError> + Send,
    {
        let _held = self.batch_locks.lock(batch_id).await;

        let store = self.poster.store();
        let mut batch = store
            .batch(batch_id)
            .await?
            .ok_or(BatchError::UnknownBatch(batch_id))?;
        apply(&mut batch)?;
        store.save_batch(batch).await?;
        Ok(())
    }
}
