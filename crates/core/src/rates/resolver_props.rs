//! Property-based tests for the rate resolver.
//!
//! - Resolution is deterministic for identical policy and query
//! - Grace periods force zero for every elapsed day inside the window
//! - Fines band lookup matches exactly one band or none

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use coopledger_shared::types::AccountId;

use super::calc::{compute_fines, compute_interest};
use super::error::RateError;
use super::policy::{AccountPolicy, AccountPolicyConfig, ComputationType, LoanModeOfPayment};
use super::resolver::{RateQuery, RateResolver};
use super::tables::{FinesBand, FinesMaturityTable};

/// Strategy for annual rates 0.00% to 100.00%.
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Strategy for positive balances 0.01 to 1,000,000.00.
fn balance_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn mode_strategy() -> impl Strategy<Value = LoanModeOfPayment> {
    prop_oneof![
        Just(LoanModeOfPayment::Daily),
        Just(LoanModeOfPayment::Weekly),
        Just(LoanModeOfPayment::SemiMonthly),
        Just(LoanModeOfPayment::Monthly),
        Just(LoanModeOfPayment::Quarterly),
        Just(LoanModeOfPayment::SemiAnnual),
        Just(LoanModeOfPayment::Lumpsum),
        (1u32..=90).prop_map(LoanModeOfPayment::FixedDays),
    ]
}

fn computation_strategy() -> impl Strategy<Value = ComputationType> {
    prop_oneof![
        Just(ComputationType::Straight),
        Just(ComputationType::Diminishing),
        Just(ComputationType::DiminishingStraight),
    ]
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Identical policy and query resolve to the same rate.
    #[test]
    fn prop_resolution_is_deterministic(
        computation in computation_strategy(),
        nominal in rate_strategy(),
        principal in balance_strategy(),
        mode in mode_strategy(),
        terms in 1u32..=60,
    ) {
        let policy = AccountPolicy::from_config(
            AccountPolicyConfig::new(AccountId::new(), computation, nominal),
        ).unwrap();
        let resolver = RateResolver::new(365);
        let query = RateQuery::interest(date(), principal, terms, mode);

        let first = resolver.resolve(&policy, &query).unwrap();
        let second = resolver.resolve(&policy, &query).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Inside the interest grace window the assessed rate and interest are zero.
    #[test]
    fn prop_interest_grace_zeroes(
        computation in computation_strategy(),
        nominal in rate_strategy(),
        balance in balance_strategy(),
        grace in 0u32..=365,
        elapsed_fraction in 0u32..=100,
    ) {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), computation, nominal);
        raw.interest_grace_period_days = i32::try_from(grace).unwrap();
        let policy = AccountPolicy::from_config(raw).unwrap();
        let elapsed = grace * elapsed_fraction / 100;

        let query = RateQuery::interest(date(), balance, 12, LoanModeOfPayment::Monthly)
            .at(elapsed, balance);
        let rate = RateResolver::default().assess(&policy, &query).unwrap();

        prop_assert!(rate.is_zero());
        prop_assert_eq!(compute_interest(balance, &rate), Decimal::ZERO);
    }

    /// Inside the fines grace window fines are zero even where no band exists.
    #[test]
    fn prop_fines_grace_zeroes(
        grace in 0u32..=365,
        elapsed_fraction in 0u32..=100,
        overdue in balance_strategy(),
        mode in mode_strategy(),
    ) {
        let mut raw = AccountPolicyConfig::new(AccountId::new(), ComputationType::Straight, Decimal::ONE);
        raw.fines_grace_period_amortization_days = i32::try_from(grace).unwrap();
        raw.fines_maturity_table = Some(FinesMaturityTable::new(vec![
            FinesBand { from_days: 400, to_days: 500, rate: Decimal::from(5) },
        ]).unwrap());
        let policy = AccountPolicy::from_config(raw).unwrap();
        let elapsed = grace * elapsed_fraction / 100;

        let query = RateQuery::fines(date(), overdue, elapsed, mode, false);
        let rate = RateResolver::default().assess(&policy, &query).unwrap();

        prop_assert!(rate.is_zero());
        prop_assert_eq!(compute_fines(overdue, &rate, elapsed, mode), Decimal::ZERO);
    }

    /// A fines lookup hits the covering band or reports `NoMatchingBand`.
    #[test]
    fn prop_fines_band_lookup(
        days in 0u32..=200,
    ) {
        let table = FinesMaturityTable::new(vec![
            FinesBand { from_days: 0, to_days: 30, rate: Decimal::from(2) },
            FinesBand { from_days: 31, to_days: 60, rate: Decimal::from(5) },
            FinesBand { from_days: 91, to_days: 120, rate: Decimal::from(8) },
        ]).unwrap();

        match table.lookup(days) {
            Ok(rate) => {
                let expected = match days {
                    0..=30 => Decimal::from(2),
                    31..=60 => Decimal::from(5),
                    _ => Decimal::from(8),
                };
                prop_assert!(days <= 60 || (91..=120).contains(&days));
                prop_assert_eq!(rate, expected);
            }
            Err(err) => {
                prop_assert!(matches!(err, RateError::NoMatchingBand { .. }), "unexpected error: {:?}", err);
                prop_assert!((61..=90).contains(&days) || days > 120);
            }
        }
    }
}
