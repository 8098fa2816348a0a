//! Ledger poster: the single writer of ledger rows and running balances.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use coopledger_core::posting::{
    self, AccountInfo, FinancialEvent, GeneralLedgerRow, LedgerKey, LedgerSource, PostingError,
    PostingPlan,
};
use coopledger_core::savings::GeneratedSavingsInterest;
use coopledger_shared::config::PostingConfig;
use coopledger_shared::types::{AccountId, TransactionBatchId};

use crate::error::StoreError;
use crate::locks::KeyLocks;
use crate::traits::{LedgerStore, PostingCommit};

/// Posts financial events as balanced ledger rows.
///
/// Every touched key is locked in key order, the ledger caches are read,
/// the plan is applied and the result is committed with the versions that
/// were read. A version conflict is retried with backoff; any other failure
/// leaves the store untouched.
pub struct LedgerPoster<S> {
    store: Arc<S>,
    locks: KeyLocks,
    config: PostingConfig,
}

impl<S: LedgerStore> LedgerPoster<S> {
    /// Creates a poster over a store.
    #[must_use]
    pub fn new(store: Arc<S>, config: PostingConfig) -> Self {
        Self {
            locks: KeyLocks::new(config.lock_timeout()),
            store,
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Posts one event.
    ///
    /// # Errors
    ///
    /// See [`post_many`](Self::post_many).
    pub async fn post(&self, event: &FinancialEvent) -> Result<Vec<GeneralLedgerRow>, PostingError> {
        self.post_many(std::slice::from_ref(event)).await
    }

    /// Posts several events in one atomic commit and returns the rows in
    /// posting order.
    ///
    /// # Errors
    ///
    /// - validation errors from planning any event; nothing is posted
    /// - `UnknownAccount` for an account the store does not know
    /// - `UnknownBatch` or `BatchClosed` for a batch that does not accept
    ///   the event
    /// - `PostingConflict` when locks or retries are exhausted
    /// - `Storage` when the store fails
    #[instrument(name = "ledger.post_many", skip(self, events), fields(events = events.len()), err)]
    pub async fn post_many(
        &self,
        events: &[FinancialEvent],
    ) -> Result<Vec<GeneralLedgerRow>, PostingError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        self.commit_events(events, None).await
    }

    /// Posts the events of a savings interest run and stores `run`, already
    /// marked posted, in the same commit.
    ///
    /// # Errors
    ///
    /// As [`post_many`](Self::post_many), plus `DuplicatePosting` if the
    /// stored run is already posted; nothing is written then.
    #[instrument(
        name = "ledger.post_savings_run",
        skip(self, events, run),
        fields(run_id = %run.id, events = events.len()),
        err
    )]
    pub async fn post_savings_run(
        &self,
        events: &[FinancialEvent],
        run: GeneratedSavingsInterest,
    ) -> Result<Vec<GeneralLedgerRow>, PostingError> {
        self.commit_events(events, Some(run)).await
    }

    async fn commit_events(
        &self,
        events: &[FinancialEvent],
        savings_run: Option<GeneratedSavingsInterest>,
    ) -> Result<Vec<GeneralLedgerRow>, PostingError> {
        let plans = events
            .iter()
            .map(PostingPlan::from_event)
            .collect::<Result<Vec<_>, _>>()?;

        self.check_batches(&plans).await?;
        let accounts = self.resolve_accounts(&plans).await?;
        let keys: Vec<LedgerKey> = plans
            .iter()
            .flat_map(PostingPlan::keys)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let batch_guards: Vec<(TransactionBatchId, LedgerSource)> = plans
            .iter()
            .filter_map(|p| p.context.transaction_batch_id.map(|id| (id, p.source)))
            .collect();

        let _guards = self.locks.acquire(&keys).await?;

        let mut attempt: u32 = 1;
        loop {
            let mut commit = self
                .prepare(&plans, &keys, &accounts, batch_guards.clone())
                .await?;
            commit.savings_run = savings_run.clone();
            let rows = commit.rows.clone();

            match self.store.commit_posting(commit).await {
                Ok(()) => {
                    info!(
                        transactions = plans.len(),
                        rows = rows.len(),
                        attempt,
                        "Posted financial events"
                    );
                    return Ok(rows);
                }
                Err(StoreError::VersionConflict { key, expected, actual })
                    if attempt < self.config.max_attempts =>
                {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        account_id = %key.account_id,
                        expected,
                        actual,
                        attempt,
                        delay = ?delay,
                        "Ledger version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(StoreError::VersionConflict { key, .. }) => {
                    warn!(account_id = %key.account_id, attempt, "Ledger version conflict, giving up");
                    return Err(PostingError::PostingConflict(format!(
                        "account {} still contended after {attempt} attempts",
                        key.account_id
                    )));
                }
                Err(err) => {
                    error!(error = %err, "Posting commit failed");
                    return Err(err.into());
                }
            }
        }
    }

    /// Recomputes the stored balance of a key as Σ(debit - credit) over its
    /// rows.
    ///
    /// # Errors
    ///
    /// `Storage`.
    pub async fn replay_balance(&self, key: LedgerKey) -> Result<Decimal, PostingError> {
        let rows = self.store.rows_for_key(key).await?;
        Ok(posting::replay_balance(&rows))
    }

    /// Balance of a key seen from its account's normal side.
    ///
    /// # Errors
    ///
    /// `UnknownAccount` or `Storage`.
    pub async fn normal_balance(&self, key: LedgerKey) -> Result<Decimal, PostingError> {
        let account = self
            .store
            .account(key.account_id)
            .await?
            .ok_or(PostingError::UnknownAccount(key.account_id))?;
        let stored = self
            .store
            .ledgers(&[key])
            .await?
            .get(&key)
            .map_or(Decimal::ZERO, |l| l.balance);
        Ok(account.normal.present(stored))
    }

    /// Returns true if the cached balance of a key equals its replayed
    /// balance.
    ///
    /// # Errors
    ///
    /// `Storage`.
    pub async fn verify_balance(&self, key: LedgerKey) -> Result<bool, PostingError> {
        let replayed = self.replay_balance(key).await?;
        let cached = self
            .store
            .ledgers(&[key])
            .await?
            .get(&key)
            .map_or(Decimal::ZERO, |l| l.balance);
        Ok(replayed == cached)
    }

    async fn check_batches(&self, plans: &[PostingPlan]) -> Result<(), PostingError> {
        for plan in plans {
            let Some(batch_id) = plan.context.transaction_batch_id else {
                continue;
            };
            let batch = self
                .store
                .batch(batch_id)
                .await?
                .ok_or(PostingError::UnknownBatch(batch_id))?;
            if !batch.accepts(plan.source) {
                return Err(PostingError::BatchClosed(batch_id));
            }
        }
        Ok(())
    }

    async fn resolve_accounts(
        &self,
        plans: &[PostingPlan],
    ) -> Result<BTreeMap<AccountId, AccountInfo>, PostingError> {
        let ids: BTreeSet<AccountId> = plans.iter().flat_map(PostingPlan::accounts).collect();
        let mut fetched = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(info) = self.store.account(id).await? {
                fetched.insert(id, info);
            }
        }

        let mut accounts = BTreeMap::new();
        for plan in plans {
            accounts.extend(plan.resolve_accounts(|id| fetched.get(&id).cloned())?);
        }
        Ok(accounts)
    }

    async fn prepare(
        &self,
        plans: &[PostingPlan],
        keys: &[LedgerKey],
        accounts: &BTreeMap<AccountId, AccountInfo>,
        batch_guards: Vec<(TransactionBatchId, LedgerSource)>,
    ) -> Result<PostingCommit, PostingError> {
        let mut ledgers = self.store.ledgers(keys).await?;
        let expected_versions = keys
            .iter()
            .map(|k| (*k, ledgers.get(k).map_or(0, |l| l.version)))
            .collect();

        let now = Utc::now();
        let mut rows = Vec::new();
        for plan in plans {
            rows.extend(plan.apply(&mut ledgers, accounts, now)?);
        }

        Ok(PostingCommit {
            expected_versions,
            ledgers: ledgers.into_values().collect(),
            rows,
            batch_guards,
            savings_run: None,
        })
    }
}
