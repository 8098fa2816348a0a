//! Persistence collaborator seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use coopledger_core::batch::{TransactionBatch, UnbalancedAccount};
use coopledger_core::posting::{AccountInfo, GeneralLedgerRow, LedgerKey, LedgerSource, MemberAccountingLedger};
use coopledger_core::savings::{GeneratedSavingsInterest, SavingsCandidate};
use coopledger_shared::types::{AccountId, GeneratedSavingsInterestId, Scope, TransactionBatchId};

use crate::error::StoreError;

/// Everything one posting writes, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct PostingCommit {
    /// Ledger version each touched key had when it was read; 0 for a key
    /// with no ledger yet.
    pub expected_versions: BTreeMap<LedgerKey, u64>,
    /// Ledger caches after the posting.
    pub ledgers: Vec<MemberAccountingLedger>,
    /// Rows to append, in posting order.
    pub rows: Vec<GeneralLedgerRow>,
    /// Batches the rows are tagged with, with the source of each row.
    pub batch_guards: Vec<(TransactionBatchId, LedgerSource)>,
    /// Savings interest run settled by the rows, stored in its posted state.
    pub savings_run: Option<GeneratedSavingsInterest>,
}

/// Storage for ledgers, rows, batches and savings runs.
///
/// Implementations must make [`commit_posting`](LedgerStore::commit_posting)
/// atomic: either every row and ledger is written or nothing is.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Looks up an account.
    async fn account(&self, id: AccountId) -> Result<Option<AccountInfo>, StoreError>;

    /// Current ledger caches for the given keys. Keys without a ledger are
    /// absent from the map.
    async fn ledgers(
        &self,
        keys: &[LedgerKey],
    ) -> Result<BTreeMap<LedgerKey, MemberAccountingLedger>, StoreError>;

    /// Writes a posting after checking every expected version and batch
    /// guard.
    ///
    /// # Errors
    ///
    /// `VersionConflict` if a key moved, `BatchNotAccepting` or
    /// `UnknownBatch` for a guard that fails, `RunAlreadyPosted` if the
    /// stored savings run is already posted.
    async fn commit_posting(&self, commit: PostingCommit) -> Result<(), StoreError>;

    /// Rows of one key in posting order.
    async fn rows_for_key(&self, key: LedgerKey) -> Result<Vec<GeneralLedgerRow>, StoreError>;

    /// Rows tagged with a batch in posting order.
    async fn rows_for_batch(
        &self,
        batch_id: TransactionBatchId,
    ) -> Result<Vec<GeneralLedgerRow>, StoreError>;

    /// Looks up a batch.
    async fn batch(&self, id: TransactionBatchId) -> Result<Option<TransactionBatch>, StoreError>;

    /// Inserts or replaces a batch.
    async fn save_batch(&self, batch: TransactionBatch) -> Result<(), StoreError>;

    /// Unbalanced account configurations of a branch.
    async fn unbalanced_accounts(&self, scope: Scope) -> Result<Vec<UnbalancedAccount>, StoreError>;

    /// Member savings ledgers of an account with their rows and profile
    /// filters.
    async fn savings_candidates(
        &self,
        scope: Scope,
        account_id: AccountId,
    ) -> Result<Vec<SavingsCandidate>, StoreError>;

    /// Looks up a savings interest run.
    async fn savings_run(
        &self,
        id: GeneratedSavingsInterestId,
    ) -> Result<Option<GeneratedSavingsInterest>, StoreError>;

    /// Savings interest runs of a branch.
    async fn savings_runs(&self, scope: Scope) -> Result<Vec<GeneratedSavingsInterest>, StoreError>;

    /// Inserts or replaces a savings interest run.
    ///
    /// # Errors
    ///
    /// `Duplicate` if another run of the branch uses the same document
    /// number.
    async fn save_savings_run(&self, run: GeneratedSavingsInterest) -> Result<(), StoreError>;
}
