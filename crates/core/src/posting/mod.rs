//! Ledger posting.
//!
//! Turns logical financial events into balanced, atomic groups of general
//! ledger rows with per-(member, account) running balances:
//! - Ledger rows and keys (`entry`)
//! - Signed running balances and member ledgers (`balance`)
//! - Events accepted by the poster (`event`)
//! - Balanced posting plans (`plan`, `validation`)

pub mod account;
pub mod balance;
pub mod entry;
pub mod error;
pub mod event;
pub mod plan;
pub mod validation;

#[cfg(test)]
mod plan_props;

pub use account::{AccountInfo, AccountKind};
pub use balance::{
    AccountTypeForBalance, LedgerComponent, MemberAccountingLedger, RunningBalance, replay_balance,
    signed_change,
};
pub use entry::{EntryType, GeneralLedgerRow, LedgerKey, LedgerSource};
pub use error::PostingError;
pub use event::{EventContext, EventKind, FinancialEvent, LoanPaymentSplit, VarianceSide};
pub use plan::{PostingLine, PostingPlan};
pub use validation::{PostingTotals, validate_lines};
