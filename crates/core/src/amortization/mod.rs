//! Loan amortization.
//!
//! Builds the all-or-nothing entry set posted when a loan is released:
//! principal, interest, automatic deductions, charges, lumpsum add-ons and
//! the cash proceeds line, plus the repayment schedule.

pub mod builder;
pub mod error;
pub mod types;

#[cfg(test)]
mod builder_props;

pub use builder::AmortizationBuilder;
pub use error::AmortizationError;
pub use types::{
    AmortizationPeriod, AutomaticLoanDeduction, DeductionBasis, LoanAccounts, LoanEntryKind,
    LoanEntrySet, LoanPolicy, LoanTransactionEntry,
};
