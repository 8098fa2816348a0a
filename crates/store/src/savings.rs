//! Savings interest runs against the store.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use tracing::{info, instrument};

use coopledger_core::posting::{GeneralLedgerRow, PostingError};
use coopledger_core::savings::{
    GeneratedSavingsInterest, SavingsError, SavingsInterestGenerator, SavingsProduct,
    SavingsRunRequest, SavingsRunStatus,
};
use coopledger_shared::types::{AccountId, GeneratedSavingsInterestId, Scope};

use crate::locks::LockMap;
use crate::poster::LedgerPoster;
use crate::traits::LedgerStore;

/// Generates savings interest runs and posts them.
///
/// Runs of the same savings account in a branch are serialized, so two
/// overlapping runs cannot both be generated.
pub struct SavingsInterestService<S> {
    poster: Arc<LedgerPoster<S>>,
    generator: SavingsInterestGenerator,
    account_locks: LockMap<(Scope, AccountId)>,
    posting: DashSet<GeneratedSavingsInterestId>,
}

struct PostingGuard<'a> {
    posting: &'a DashSet<GeneratedSavingsInterestId>,
    id: GeneratedSavingsInterestId,
}

impl Drop for PostingGuard<'_> {
    fn drop(&mut self) {
        self.posting.remove(&self.id);
    }
}

impl<S: LedgerStore> SavingsInterestService<S> {
    /// Creates a service posting through `poster`.
    #[must_use]
    pub fn new(poster: Arc<LedgerPoster<S>>, generator: SavingsInterestGenerator) -> Self {
        Self {
            poster,
            generator,
            account_locks: LockMap::new(),
            posting: DashSet::new(),
        }
    }

    /// Generates and stores a pending run.
    ///
    /// # Errors
    ///
    /// - `DuplicateRun` if the document number is taken in the branch or an
    ///   earlier run of the account overlaps the range
    /// - generator errors for invalid ranges and settings
    /// - `Posting(Storage)` when the store fails
    #[instrument(
        name = "savings.generate",
        skip(self, request, product),
        fields(document_no = %request.document_no, account_id = %product.account_id),
        err
    )]
    pub async fn generate(
        &self,
        request: SavingsRunRequest,
        product: &SavingsProduct,
    ) -> Result<GeneratedSavingsInterest, SavingsError> {
        let _held = self
            .account_locks
            .lock((request.scope, product.account_id))
            .await;

        let store = self.poster.store();
        for run in store.savings_runs(request.scope).await? {
            if run.request.document_no == request.document_no {
                return Err(SavingsError::DuplicateRun(request.document_no));
            }
            if run.account_id == product.account_id && run.overlaps(&request) {
                return Err(SavingsError::DuplicateRun(format!(
                    "{} overlaps {}",
                    request.document_no, run.request.document_no
                )));
            }
        }

        let candidates = store
            .savings_candidates(request.scope, product.account_id)
            .await?;
        let run = self
            .generator
            .generate(request, product, &candidates, Utc::now())?;
        store.save_savings_run(run.clone()).await?;

        info!(
            run_id = %run.id,
            candidates = candidates.len(),
            entries = run.entries.len(),
            total_interest = %run.total_interest(),
            total_tax = %run.total_tax(),
            "Savings interest generated"
        );
        Ok(run)
    }

    /// Posts every entry of a pending run and marks the run posted, in one
    /// atomic commit.
    ///
    /// `product` must be the product the run was generated for.
    ///
    /// # Errors
    ///
    /// - `UnknownRun`
    /// - `ProductMismatch` for a product of another savings account
    /// - `AlreadyPosted` for a posted run or one being posted
    /// - `Posting` when any entry cannot be posted; none are
    #[instrument(name = "savings.post", skip(self, product), err)]
    pub async fn post(
        &self,
        run_id: GeneratedSavingsInterestId,
        product: &SavingsProduct,
    ) -> Result<Vec<GeneralLedgerRow>, SavingsError> {
        if !self.posting.insert(run_id) {
            return Err(SavingsError::AlreadyPosted(run_id));
        }
        let _posting = PostingGuard {
            posting: &self.posting,
            id: run_id,
        };

        let store = self.poster.store();
        let mut run = store
            .savings_run(run_id)
            .await?
            .ok_or(SavingsError::UnknownRun(run_id))?;
        if run.status == SavingsRunStatus::Posted {
            return Err(SavingsError::AlreadyPosted(run_id));
        }
        if product.account_id != run.account_id {
            return Err(SavingsError::ProductMismatch {
                run: run_id,
                expected: run.account_id,
                found: product.account_id,
            });
        }

        let events = run.posting_events(product);
        run.status = SavingsRunStatus::Posted;
        run.posted_at = Some(Utc::now());
        let rows = match self.poster.post_savings_run(&events, run).await {
            Ok(rows) => rows,
            Err(PostingError::DuplicatePosting(_)) => {
                return Err(SavingsError::AlreadyPosted(run_id));
            }
            Err(err) => return Err(err.into()),
        };

        info!(run_id = %run_id, rows = rows.len(), "Savings interest posted");
        Ok(rows)
    }
}
