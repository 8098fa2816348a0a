//! Rate resolution.
//!
//! [`RateResolver`] is stateless apart from the branch day-count convention,
//! so identical policy and query always produce the same rate.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::round_money;

use super::error::RateError;
use super::policy::{
    AccountPolicy, ComputationPolicy, GracePeriod, LoanModeOfPayment, StraightYearlyVariant,
};
use super::tables::{ChargeContext, ChargesRateScheme};

/// What is being priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Loan interest.
    Interest,
    /// Late payment fines.
    Fines,
}

/// How a resolved rate is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// Applied once to the original principal for the whole term.
    WholeTerm,
    /// Applied each period to the declining balance.
    DecliningBalance,
    /// Applied each period to the balance at the start of the loan year.
    YearlyBalance,
    /// Applied per period of delay to the overdue amount.
    PerDelayPeriod,
}

/// A resolved rate, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Nominal rate after table lookup, caps and grace percentage.
    pub nominal: Decimal,
    /// Rate applied per period, at full precision.
    pub period: Decimal,
    /// How `period` is applied.
    pub basis: RateBasis,
}

impl Rate {
    /// A zero rate with the given basis.
    #[must_use]
    pub const fn zero(basis: RateBasis) -> Self {
        Self {
            nominal: Decimal::ZERO,
            period: Decimal::ZERO,
            basis,
        }
    }

    /// Returns true if nothing accrues at this rate.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.period.is_zero()
    }
}

/// Query context for a rate resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuery {
    /// What is being priced.
    pub kind: RateKind,
    /// Effective date; the only time input to resolution.
    pub date: NaiveDate,
    /// Days elapsed since release (interest) or due date (fines).
    pub elapsed_days: u32,
    /// Loan terms in months.
    pub terms: u32,
    /// Original principal.
    pub principal: Decimal,
    /// Outstanding balance.
    pub balance: Decimal,
    /// Mode of payment.
    pub mode_of_payment: LoanModeOfPayment,
    /// Fines query for an amount overdue past maturity.
    pub past_maturity: bool,
}

impl RateQuery {
    /// An interest query at release.
    #[must_use]
    pub fn interest(date: NaiveDate, principal: Decimal, terms: u32, mode_of_payment: LoanModeOfPayment) -> Self {
        Self {
            kind: RateKind::Interest,
            date,
            elapsed_days: 0,
            terms,
            principal,
            balance: principal,
            mode_of_payment,
            past_maturity: false,
        }
    }

    /// A fines query for an overdue amount.
    #[must_use]
    pub fn fines(
        date: NaiveDate,
        overdue: Decimal,
        days_past_due: u32,
        mode_of_payment: LoanModeOfPayment,
        past_maturity: bool,
    ) -> Self {
        Self {
            kind: RateKind::Fines,
            date,
            elapsed_days: days_past_due,
            terms: 0,
            principal: overdue,
            balance: overdue,
            mode_of_payment,
            past_maturity,
        }
    }

    /// Same query at another elapsed day and balance.
    #[must_use]
    pub fn at(self, elapsed_days: u32, balance: Decimal) -> Self {
        Self {
            elapsed_days,
            balance,
            ..self
        }
    }
}

/// Resolves interest, fines and charge rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateResolver {
    annual_divisor: u32,
}

impl Default for RateResolver {
    fn default() -> Self {
        Self::new(365)
    }
}

impl RateResolver {
    /// Creates a resolver for a branch day-count convention.
    #[must_use]
    pub const fn new(annual_divisor: u32) -> Self {
        Self { annual_divisor }
    }

    /// The branch day-count convention.
    #[must_use]
    pub const fn annual_divisor(&self) -> u32 {
        self.annual_divisor
    }

    /// Grace period that governs the query.
    #[must_use]
    pub fn grace_period(policy: &AccountPolicy, query: &RateQuery) -> GracePeriod {
        match query.kind {
            RateKind::Interest => policy.interest_grace,
            RateKind::Fines if query.past_maturity => policy.fines_grace_maturity,
            RateKind::Fines => policy.fines_grace_amortization,
        }
    }

    /// Resolves the rate, forcing zero inside the grace period.
    ///
    /// The grace check runs before any table lookup, so a query inside the
    /// grace window never fails with `NoMatchingBand`.
    ///
    /// # Errors
    ///
    /// Propagates [`RateResolver::resolve`] errors.
    pub fn assess(&self, policy: &AccountPolicy, query: &RateQuery) -> Result<Rate, RateError> {
        if Self::grace_period(policy, query).zeroes(query.elapsed_days) {
            return Ok(Rate::zero(Self::basis(policy, query.kind)));
        }
        self.resolve(policy, query)
    }

    /// Resolves the rate for a query, ignoring grace periods.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingBand` if a configured rate table has no band for the
    /// query, or `InvalidTerms` for a schedule without periods.
    pub fn resolve(&self, policy: &AccountPolicy, query: &RateQuery) -> Result<Rate, RateError> {
        match query.kind {
            RateKind::Interest => self.resolve_interest(policy, query),
            RateKind::Fines => Self::resolve_fines(policy, query),
        }
    }

    fn basis(policy: &AccountPolicy, kind: RateKind) -> RateBasis {
        match (kind, policy.computation) {
            (RateKind::Fines, _) => RateBasis::PerDelayPeriod,
            (RateKind::Interest, ComputationPolicy::Straight) => RateBasis::WholeTerm,
            (RateKind::Interest, ComputationPolicy::Diminishing(_)) => RateBasis::DecliningBalance,
            (RateKind::Interest, ComputationPolicy::DiminishingStraight(_)) => {
                RateBasis::YearlyBalance
            }
        }
    }

    fn resolve_interest(&self, policy: &AccountPolicy, query: &RateQuery) -> Result<Rate, RateError> {
        let mut nominal = match &policy.interest_table {
            Some(table) => table.lookup(query.date, query.principal, query.terms)?,
            None => policy.interest_standard,
        };
        if let Some(cap) = policy.max_interest_rate {
            nominal = nominal.min(cap);
        }

        let basis = Self::basis(policy, RateKind::Interest);
        let period = match policy.computation {
            ComputationPolicy::Straight => nominal,
            ComputationPolicy::Diminishing(_)
            | ComputationPolicy::DiminishingStraight(StraightYearlyVariant::None) => {
                let periods = query.mode_of_payment.periods_per_year(self.annual_divisor);
                if periods.is_zero() {
                    return Err(RateError::InvalidTerms(format!(
                        "{:?} has no periods per year",
                        query.mode_of_payment
                    )));
                }
                nominal / periods
            }
            ComputationPolicy::DiminishingStraight(StraightYearlyVariant::ByDailyInterestBalance) => {
                if self.annual_divisor == 0 {
                    return Err(RateError::InvalidTerms("annual divisor is zero".to_string()));
                }
                nominal / Decimal::from(self.annual_divisor)
                    * Decimal::from(query.mode_of_payment.days_per_period())
            }
        };

        Ok(Rate {
            nominal,
            period,
            basis,
        })
    }

    fn resolve_fines(policy: &AccountPolicy, query: &RateQuery) -> Result<Rate, RateError> {
        let mut nominal = match &policy.fines_maturity_table {
            Some(table) => table.lookup(query.elapsed_days)?,
            None if query.past_maturity => policy.fines_maturity,
            None => policy.fines_amort,
        };
        if let Some(cap) = policy.max_fines_rate {
            nominal = nominal.min(cap);
        }
        if let Some(percentages) = &policy.fines_grace_percentage {
            let grace = percentages.for_mode(query.mode_of_payment);
            if grace >= Decimal::ONE_HUNDRED {
                nominal = Decimal::ZERO;
            } else if grace > Decimal::ZERO {
                nominal *= Decimal::ONE - grace / Decimal::ONE_HUNDRED;
            }
        }

        Ok(Rate {
            nominal,
            period: nominal,
            basis: RateBasis::PerDelayPeriod,
        })
    }

    /// Charge for a loan under a charges scheme, rounded to cents.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingBand` if no scheme row covers the loan.
    pub fn resolve_charge(&self, scheme: &ChargesRateScheme, ctx: &ChargeContext) -> Result<Decimal, RateError> {
        scheme.charge(ctx).map(round_money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::policy::{AccountPolicyConfig, ComputationType, DiminishingVariant};
    use crate::rates::tables::{FinesBand, FinesMaturityTable};
    use coopledger_shared::types::AccountId;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn policy(computation_type: ComputationType, rate: Decimal) -> AccountPolicy {
        AccountPolicy::from_config(AccountPolicyConfig::new(AccountId::new(), computation_type, rate))
            .unwrap()
    }

    fn fines_policy() -> AccountPolicy {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Straight, dec!(12));
        raw.fines_maturity_table = Some(
            FinesMaturityTable::new(vec![
                FinesBand { from_days: 0, to_days: 30, rate: dec!(2) },
                FinesBand { from_days: 31, to_days: 60, rate: dec!(5) },
            ])
            .unwrap(),
        );
        AccountPolicy::from_config(raw).unwrap()
    }

    #[test]
    fn test_straight_rate_is_unmodified() {
        let resolver = RateResolver::default();
        let query = RateQuery::interest(date(), dec!(10000), 12, LoanModeOfPayment::Monthly);
        let rate = resolver.resolve(&policy(ComputationType::Straight, dec!(12)), &query).unwrap();
        assert_eq!(rate.nominal, dec!(12));
        assert_eq!(rate.period, dec!(12));
        assert_eq!(rate.basis, RateBasis::WholeTerm);
    }

    #[test]
    fn test_diminishing_period_rate() {
        let resolver = RateResolver::default();
        let query = RateQuery::interest(date(), dec!(9000), 3, LoanModeOfPayment::Monthly);
        let rate = resolver
            .resolve(&policy(ComputationType::Diminishing, dec!(12)), &query)
            .unwrap();
        assert_eq!(rate.period, dec!(1));
        assert_eq!(rate.basis, RateBasis::DecliningBalance);
    }

    #[test]
    fn test_daily_interest_balance_variant() {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::DiminishingStraight, dec!(36.5));
        raw.interest_fines_computation_diminishing_straight_yearly =
            StraightYearlyVariant::ByDailyInterestBalance;
        let policy = AccountPolicy::from_config(raw).unwrap();
        let query = RateQuery::interest(date(), dec!(1000), 12, LoanModeOfPayment::Monthly);
        let rate = RateResolver::new(365).resolve(&policy, &query).unwrap();
        assert_eq!(rate.period, dec!(3));
        assert_eq!(rate.basis, RateBasis::YearlyBalance);
    }

    #[test]
    fn test_interest_cap() {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Diminishing, dec!(30));
        raw.interest_fines_computation_diminishing = DiminishingVariant::ByAmortization;
        raw.max_interest_rate = Some(dec!(24));
        let policy = AccountPolicy::from_config(raw).unwrap();
        let query = RateQuery::interest(date(), dec!(1000), 12, LoanModeOfPayment::Monthly);
        let rate = RateResolver::default().resolve(&policy, &query).unwrap();
        assert_eq!(rate.nominal, dec!(24));
        assert_eq!(rate.period, dec!(2));
    }

    #[test]
    fn test_fines_band_day_45() {
        let query = RateQuery::fines(date(), dec!(1000), 45, LoanModeOfPayment::Monthly, false);
        let rate = RateResolver::default().resolve(&fines_policy(), &query).unwrap();
        assert_eq!(rate.nominal, dec!(5));
    }

    #[test]
    fn test_fines_band_day_90_has_no_band() {
        let query = RateQuery::fines(date(), dec!(1000), 90, LoanModeOfPayment::Monthly, false);
        let err = RateResolver::default().resolve(&fines_policy(), &query).unwrap_err();
        assert!(matches!(err, RateError::NoMatchingBand { .. }));
    }

    #[test]
    fn test_grace_check_precedes_band_lookup() {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Straight, dec!(12));
        raw.fines_grace_period_amortization_days = 120;
        raw.fines_maturity_table = fines_policy().fines_maturity_table;
        let policy = AccountPolicy::from_config(raw).unwrap();
        let query = RateQuery::fines(date(), dec!(1000), 90, LoanModeOfPayment::Monthly, false);
        let rate = RateResolver::default().assess(&policy, &query).unwrap();
        assert!(rate.is_zero());
    }

    #[test]
    fn test_fines_without_table_use_amort_or_maturity() {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Straight, dec!(12));
        raw.fines_amort = dec!(2);
        raw.fines_maturity = dec!(3);
        let policy = AccountPolicy::from_config(raw).unwrap();
        let resolver = RateResolver::default();

        let during = RateQuery::fines(date(), dec!(1000), 10, LoanModeOfPayment::Monthly, false);
        assert_eq!(resolver.resolve(&policy, &during).unwrap().nominal, dec!(2));
        let after = RateQuery::fines(date(), dec!(1000), 10, LoanModeOfPayment::Monthly, true);
        assert_eq!(resolver.resolve(&policy, &after).unwrap().nominal, dec!(3));
    }

    #[test]
    fn test_fines_grace_percentage() {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Straight, dec!(12));
        raw.fines_amort = dec!(4);
        raw.fines_grace_percentage.monthly = dec!(25);
        raw.fines_grace_percentage.weekly = dec!(100);
        let policy = AccountPolicy::from_config(raw).unwrap();
        let resolver = RateResolver::default();

        let monthly = RateQuery::fines(date(), dec!(1000), 10, LoanModeOfPayment::Monthly, false);
        assert_eq!(resolver.resolve(&policy, &monthly).unwrap().nominal, dec!(3));
        let weekly = RateQuery::fines(date(), dec!(1000), 10, LoanModeOfPayment::Weekly, false);
        assert!(resolver.resolve(&policy, &weekly).unwrap().is_zero());
    }

    #[test]
    fn test_fixed_days_without_period_is_invalid() {
        let query = RateQuery::interest(date(), dec!(1000), 12, LoanModeOfPayment::FixedDays(0));
        let result = RateResolver::default().resolve(&policy(ComputationType::Diminishing, dec!(12)), &query);
        assert!(matches!(result, Err(RateError::InvalidTerms(_))));
    }
}
