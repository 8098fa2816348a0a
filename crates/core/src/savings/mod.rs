//! Savings interest generation.
//!
//! Reconstructs daily ending balances from ledger rows, applies one of seven
//! balance formulas and produces pending per-member entries. Posting the
//! entries is done by the store's savings service through the ledger poster.

pub mod balances;
pub mod error;
pub mod formula;
pub mod generator;
pub mod types;

pub use balances::{DailyBalances, MonthBalances};
pub use error::SavingsError;
pub use formula::{
    MIN_DAYS_FOR_LOWEST, balance_days, compute_interest_tax, compute_savings_interest,
    interest_base,
};
pub use generator::SavingsInterestGenerator;
pub use types::{
    GeneratedSavingsInterest, GeneratedSavingsInterestEntry, SavingsCandidate,
    SavingsComputationType, SavingsProduct, SavingsRunRequest, SavingsRunStatus,
};
