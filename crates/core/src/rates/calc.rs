//! Loan arithmetic built on resolved rates.
//!
//! Every function returns an amount already rounded to cents.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use coopledger_shared::types::{percent_of, round_money};

use super::error::RateError;
use super::policy::LoanModeOfPayment;
use super::resolver::Rate;

fn require_terms(terms: u32) -> Result<(), RateError> {
    if terms == 0 {
        return Err(RateError::InvalidTerms(
            "terms must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Number of payments for a loan of `terms` months.
///
/// Quarterly and semi-annual loans round down to whole payments.
///
/// # Errors
///
/// Returns `InvalidTerms` for zero terms, zero fixed days, or a term too
/// short for a single quarterly or semi-annual payment.
pub fn number_of_payments(mode: LoanModeOfPayment, terms: u32) -> Result<u32, RateError> {
    require_terms(terms)?;
    let payments = match mode {
        LoanModeOfPayment::Daily => terms.saturating_mul(30),
        LoanModeOfPayment::Weekly => terms.saturating_mul(4),
        LoanModeOfPayment::SemiMonthly => terms.saturating_mul(2),
        LoanModeOfPayment::Monthly => terms,
        LoanModeOfPayment::Quarterly => terms / 3,
        LoanModeOfPayment::SemiAnnual => terms / 6,
        LoanModeOfPayment::Lumpsum => 1,
        LoanModeOfPayment::FixedDays(0) => {
            return Err(RateError::InvalidTerms(
                "fixed days must be greater than 0".to_string(),
            ));
        }
        LoanModeOfPayment::FixedDays(days) => terms.saturating_mul(30) / days,
    };
    if payments == 0 {
        return Err(RateError::InvalidTerms(format!(
            "{terms} months is too short for a {mode:?} schedule"
        )));
    }
    Ok(payments)
}

/// Interest for one period on a balance.
#[must_use]
pub fn compute_interest(balance: Decimal, rate: &Rate) -> Decimal {
    if balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(percent_of(balance, rate.period))
}

/// Straight interest on the original principal for a term of `terms` months.
///
/// The rate is annual, so a one-year term yields `principal × rate`.
#[must_use]
pub fn compute_straight_interest(principal: Decimal, rate: &Rate, terms: u32) -> Decimal {
    if principal <= Decimal::ZERO || rate.nominal <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(percent_of(principal, rate.nominal) * Decimal::from(terms) / Decimal::from(12))
}

/// Fines on an overdue amount for `days_late` days at a resolved fines rate.
///
/// Delay is measured in fractional periods of the mode of payment; lumpsum
/// loans are fined once.
#[must_use]
pub fn compute_fines(overdue: Decimal, rate: &Rate, days_late: u32, mode: LoanModeOfPayment) -> Decimal {
    if days_late == 0 || overdue <= Decimal::ZERO || rate.period <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let periods = match mode {
        LoanModeOfPayment::Lumpsum => Decimal::ONE,
        LoanModeOfPayment::FixedDays(_) => Decimal::from(days_late),
        other => Decimal::from(days_late) / Decimal::from(other.days_per_period()),
    };
    round_money(percent_of(overdue, rate.period) * periods)
}

/// Amount due each payment for a total payable spread over `terms` months.
///
/// # Errors
///
/// Returns `InvalidTerms` for zero terms.
pub fn amortization_amount(
    total_payable: Decimal,
    terms: u32,
    mode: LoanModeOfPayment,
) -> Result<Decimal, RateError> {
    if mode == LoanModeOfPayment::Lumpsum {
        return Ok(round_money(total_payable));
    }
    require_terms(terms)?;
    let terms = Decimal::from(terms);
    let amount = match mode {
        LoanModeOfPayment::Daily => total_payable / terms / Decimal::from(30),
        LoanModeOfPayment::Weekly => total_payable / terms / Decimal::from(4),
        LoanModeOfPayment::SemiMonthly => total_payable / terms / Decimal::TWO,
        LoanModeOfPayment::Quarterly => total_payable / (terms / Decimal::from(3)),
        LoanModeOfPayment::SemiAnnual => total_payable / (terms / Decimal::from(6)),
        LoanModeOfPayment::FixedDays(0) => {
            return Err(RateError::InvalidTerms(
                "fixed days must be greater than 0".to_string(),
            ));
        }
        LoanModeOfPayment::Monthly | LoanModeOfPayment::FixedDays(_) | LoanModeOfPayment::Lumpsum => {
            total_payable / terms
        }
    };
    Ok(round_money(amount))
}

/// Loan terms (months) needed to repay `principal` at `suggested_amount`
/// per payment, rounded up and never below one.
///
/// # Errors
///
/// Returns `InvalidTerms` for a non-positive amount or principal, or zero
/// fixed days.
pub fn suggested_number_of_terms(
    suggested_amount: Decimal,
    principal: Decimal,
    mode: LoanModeOfPayment,
) -> Result<u32, RateError> {
    if suggested_amount <= Decimal::ZERO {
        return Err(RateError::InvalidTerms(
            "suggested amount must be greater than zero".to_string(),
        ));
    }
    if principal <= Decimal::ZERO {
        return Err(RateError::InvalidTerms("principal must be greater than zero".to_string()));
    }
    let payments = principal / suggested_amount;
    let terms = match mode {
        LoanModeOfPayment::Daily => payments / Decimal::from(30),
        LoanModeOfPayment::Weekly => payments / Decimal::from(4),
        LoanModeOfPayment::SemiMonthly => payments / Decimal::TWO,
        LoanModeOfPayment::Monthly => payments,
        LoanModeOfPayment::Quarterly => payments * Decimal::from(3),
        LoanModeOfPayment::SemiAnnual => payments * Decimal::from(6),
        LoanModeOfPayment::Lumpsum => Decimal::ONE,
        LoanModeOfPayment::FixedDays(0) => {
            return Err(RateError::InvalidTerms(
                "fixed days must be greater than 0".to_string(),
            ));
        }
        LoanModeOfPayment::FixedDays(days) => payments * Decimal::from(days) / Decimal::from(30),
    };
    let terms = terms
        .ceil()
        .to_u32()
        .ok_or_else(|| RateError::InvalidTerms(format!("{terms} terms out of range")))?;
    Ok(terms.max(1))
}
