//! Rate resolution.
//!
//! This module turns an account's computation policy and rate tables into
//! interest, fines and charge rates:
//! - Validated account policies (`policy`)
//! - Band-based rate tables and charges schemes (`tables`)
//! - The stateless resolver (`resolver`)
//! - Loan arithmetic on resolved rates (`calc`)

pub mod calc;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod tables;

#[cfg(test)]
mod resolver_props;

pub use calc::{
    amortization_amount, compute_fines, compute_interest, compute_straight_interest,
    number_of_payments, suggested_number_of_terms,
};
pub use error::RateError;
pub use policy::{
    AccountPolicy, AccountPolicyConfig, ComputationPolicy, ComputationType, DiminishingVariant,
    EarnedUnearnedInterest, FinesGracePercentages, GraceCutOff, GracePeriod, LoanModeOfPayment,
    LoanSavingType, LumpsumComputation, StraightYearlyVariant,
};
pub use resolver::{Rate, RateBasis, RateKind, RateQuery, RateResolver};
pub use tables::{
    AmountBand, ChargeContext, ChargesRateRows, ChargesRateScheme, ChargesRateSchemeType, DateBand,
    FinesBand, FinesMaturityTable, InterestRateTable, ModeOfPaymentBand, RangeCharge, TermCharge,
    TermRates, YearBand, TERM_COLUMNS,
};
