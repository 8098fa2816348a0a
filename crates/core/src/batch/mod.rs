//! Transaction batch reconciliation.
//!
//! A cashier's batch moves `Open → Closing → Closed`. Closing sums the
//! recorded counts and the ledger rows tagged with the batch, classifies the
//! result as balanced, overage or shortage, and produces the variance event
//! posted to the configured suspense account.

pub mod error;
pub mod reconcile;
pub mod types;

#[cfg(test)]
mod reconcile_props;

pub use error::BatchError;
pub use reconcile::{BatchTotals, classify, variance_event};
pub use types::{
    BatchState, CashCount, Remittance, RemittanceKind, TransactionBatch,
    TransactionBatchBalanceStatus, UnbalancedAccount, select_unbalanced_account,
};
