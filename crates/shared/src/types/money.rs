//! Money rounding with fixed-point decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount is a `rust_decimal::Decimal`.
//!
//! Rounding rule: an amount produced by a percentage computation is rounded
//! to [`MONEY_SCALE`] places, half away from zero, at the moment it becomes
//! an entry amount. Rates and intermediate products keep full precision.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places stored for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to cents, half away from zero.
///
/// ```
/// use rust_decimal_macros::dec;
/// use coopledger_shared::types::round_money;
///
/// assert_eq!(round_money(dec!(10.005)), dec!(10.01));
/// assert_eq!(round_money(dec!(-10.005)), dec!(-10.01));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies a percentage rate to an amount without rounding.
#[must_use]
pub fn percent_of(amount: Decimal, rate_percent: Decimal) -> Decimal {
    amount * rate_percent / Decimal::ONE_HUNDRED
}
