//! In-process [`LedgerStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use coopledger_core::batch::{TransactionBatch, UnbalancedAccount};
use coopledger_core::posting::{AccountInfo, GeneralLedgerRow, LedgerKey, MemberAccountingLedger};
use coopledger_core::savings::{GeneratedSavingsInterest, SavingsCandidate, SavingsRunStatus};
use coopledger_shared::types::{
    AccountId, GeneratedSavingsInterestId, MemberId, MemberTypeId, Scope, TransactionBatchId,
};

use crate::error::StoreError;
use crate::traits::{LedgerStore, PostingCommit};

/// Member attributes used to filter savings interest candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberProfile {
    /// Member type.
    pub member_type_id: Option<MemberTypeId>,
    /// Accounts closed for the member.
    pub closed_accounts: BTreeSet<AccountId>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, AccountInfo>,
    ledgers: BTreeMap<LedgerKey, MemberAccountingLedger>,
    rows: Vec<GeneralLedgerRow>,
    batches: HashMap<TransactionBatchId, TransactionBatch>,
    unbalanced: Vec<UnbalancedAccount>,
    members: HashMap<MemberId, MemberProfile>,
    runs: BTreeMap<GeneratedSavingsInterestId, GeneratedSavingsInterest>,
}

/// A [`LedgerStore`] held in memory behind one lock.
///
/// Commits take the write lock, so a posting is visible completely or not
/// at all. Failures and version conflicts can be injected for tests.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
    failing_commits: AtomicU32,
    conflicting_commits: AtomicU32,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account.
    pub async fn add_account(&self, info: AccountInfo) {
        self.inner.write().await.accounts.insert(info.id, info);
    }

    /// Registers an unbalanced account configuration.
    pub async fn add_unbalanced_account(&self, account: UnbalancedAccount) {
        self.inner.write().await.unbalanced.push(account);
    }

    /// Sets the profile of a member.
    pub async fn set_member_profile(&self, member_id: MemberId, profile: MemberProfile) {
        self.inner.write().await.members.insert(member_id, profile);
    }

    /// Makes the next `n` commits fail as unavailable.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` commits fail with a version conflict, as if
    /// another writer got there first.
    pub fn conflict_next_commits(&self, n: u32) {
        self.conflicting_commits.store(n, Ordering::SeqCst);
    }

    /// Every row in posting order.
    pub async fn all_rows(&self) -> Vec<GeneralLedgerRow> {
        self.inner.read().await.rows.clone()
    }

    /// Ledger cache of one key.
    pub async fn ledger(&self, key: LedgerKey) -> Option<MemberAccountingLedger> {
        self.inner.read().await.ledgers.get(&key).cloned()
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn account(&self, id: AccountId) -> Result<Option<AccountInfo>, StoreError> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn ledgers(
        &self,
        keys: &[LedgerKey],
    ) -> Result<BTreeMap<LedgerKey, MemberAccountingLedger>, StoreError> {
        let inner = self.inner.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| inner.ledgers.get(k).map(|l| (*k, l.clone())))
            .collect())
    }

    async fn commit_posting(&self, commit: PostingCommit) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if take_one(&self.failing_commits) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        if take_one(&self.conflicting_commits) {
            if let Some((key, expected)) = commit.expected_versions.iter().next() {
                return Err(StoreError::VersionConflict {
                    key: *key,
                    expected: *expected,
                    actual: expected + 1,
                });
            }
        }

        for (key, expected) in &commit.expected_versions {
            let actual = inner.ledgers.get(key).map_or(0, |l| l.version);
            if actual != *expected {
                return Err(StoreError::VersionConflict {
                    key: *key,
                    expected: *expected,
                    actual,
                });
            }
        }
        for (batch_id, source) in &commit.batch_guards {
            let batch = inner
                .batches
                .get(batch_id)
                .ok_or(StoreError::UnknownBatch(*batch_id))?;
            if !batch.accepts(*source) {
                return Err(StoreError::BatchNotAccepting(*batch_id));
            }
        }
        if let Some(run) = &commit.savings_run {
            if inner
                .runs
                .get(&run.id)
                .is_some_and(|stored| stored.status == SavingsRunStatus::Posted)
            {
                return Err(StoreError::RunAlreadyPosted(run.id));
            }
        }

        for ledger in commit.ledgers {
            inner.ledgers.insert(ledger.key, ledger);
        }
        inner.rows.extend(commit.rows);
        if let Some(run) = commit.savings_run {
            inner.runs.insert(run.id, run);
        }
        Ok(())
    }

    async fn rows_for_key(&self, key: LedgerKey) -> Result<Vec<GeneralLedgerRow>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.rows.iter().filter(|r| r.key() == key).cloned().collect())
    }

    async fn rows_for_batch(
        &self,
        batch_id: TransactionBatchId,
    ) -> Result<Vec<GeneralLedgerRow>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.transaction_batch_id == Some(batch_id))
            .cloned()
            .collect())
    }

    async fn batch(&self, id: TransactionBatchId) -> Result<Option<TransactionBatch>, StoreError> {
        Ok(self.inner.read().await.batches.get(&id).cloned())
    }

    async fn save_batch(&self, batch: TransactionBatch) -> Result<(), StoreError> {
        self.inner.write().await.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn unbalanced_accounts(&self, scope: Scope) -> Result<Vec<UnbalancedAccount>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .unbalanced
            .iter()
            .filter(|u| u.scope == scope)
            .cloned()
            .collect())
    }

    async fn savings_candidates(
        &self,
        scope: Scope,
        account_id: AccountId,
    ) -> Result<Vec<SavingsCandidate>, StoreError> {
        let inner = self.inner.read().await;
        let normal = inner
            .accounts
            .get(&account_id)
            .map(|a| a.normal)
            .unwrap_or_default();
        let candidates = inner
            .ledgers
            .values()
            .filter(|l| l.scope == scope && l.key.account_id == account_id)
            .filter_map(|l| {
                let member_id = l.key.member_id?;
                let profile = inner.members.get(&member_id).cloned().unwrap_or_default();
                Some(SavingsCandidate {
                    member_id,
                    member_type_id: profile.member_type_id,
                    closed: profile.closed_accounts.contains(&account_id),
                    normal,
                    rows: inner.rows.iter().filter(|r| r.key() == l.key).cloned().collect(),
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn savings_run(
        &self,
        id: GeneratedSavingsInterestId,
    ) -> Result<Option<GeneratedSavingsInterest>, StoreError> {
        Ok(self.inner.read().await.runs.get(&id).cloned())
    }

    async fn savings_runs(&self, scope: Scope) -> Result<Vec<GeneratedSavingsInterest>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .values()
            .filter(|r| r.request.scope == scope)
            .cloned()
            .collect())
    }

    async fn save_savings_run(&self, run: GeneratedSavingsInterest) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let taken = inner.runs.values().any(|r| {
            r.id != run.id
                && r.request.scope == run.request.scope
                && r.request.document_no == run.request.document_no
        });
        if taken {
            return Err(StoreError::Duplicate(run.request.document_no));
        }
        inner.runs.insert(run.id, run);
        Ok(())
    }
}
