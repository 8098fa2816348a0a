//! Persistence seam and transactional services for Coopledger.
//!
//! The core crate computes; this crate writes:
//! - `LedgerStore` is the persistence collaborator seam
//! - `MemoryLedgerStore` is a complete in-process implementation
//! - `LedgerPoster` is the single writer of ledger rows and running balances
//! - `BatchReconciler` closes cashier batches through the poster
//! - `SavingsInterestService` generates and posts savings interest runs

pub mod error;
pub mod locks;
pub mod memory;
pub mod poster;
pub mod reconciler;
pub mod savings;
pub mod traits;

pub use error::StoreError;
pub use locks::{KeyLocks, LockMap};
pub use memory::{MemberProfile, MemoryLedgerStore};
pub use poster::LedgerPoster;
pub use reconciler::{BatchCloseReport, BatchReconciler};
pub use savings::SavingsInterestService;
pub use traits::{LedgerStore, PostingCommit};
