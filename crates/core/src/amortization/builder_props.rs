//! Property-based tests for the amortization builder.
//!
//! - Every built entry set balances and nets to its proceeds
//! - Schedule principal sums to the loan principal

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use coopledger_shared::types::AccountId;

use super::builder::AmortizationBuilder;
use super::types::{AutomaticLoanDeduction, LoanAccounts, LoanEntryKind, LoanPolicy};
use crate::rates::{
    AccountPolicy, AccountPolicyConfig, ComputationType, LoanModeOfPayment, LumpsumComputation,
};

fn principal_strategy() -> impl Strategy<Value = Decimal> {
    (100_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=2_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn computation_strategy() -> impl Strategy<Value = ComputationType> {
    prop_oneof![
        Just(ComputationType::Straight),
        Just(ComputationType::Diminishing),
        Just(ComputationType::DiminishingStraight),
    ]
}

fn lumpsum_strategy() -> impl Strategy<Value = LumpsumComputation> {
    prop_oneof![
        Just(LumpsumComputation::None),
        Just(LumpsumComputation::FinesMaturity),
        Just(LumpsumComputation::InterestMaturity),
        Just(LumpsumComputation::AdvanceInterest),
    ]
}

fn mode_strategy() -> impl Strategy<Value = LoanModeOfPayment> {
    prop_oneof![
        Just(LoanModeOfPayment::Weekly),
        Just(LoanModeOfPayment::SemiMonthly),
        Just(LoanModeOfPayment::Monthly),
        Just(LoanModeOfPayment::Lumpsum),
    ]
}

fn loan(computation: ComputationType, rate: Decimal, lumpsum: LumpsumComputation, fee_percent: Decimal) -> LoanPolicy {
    let mut raw = AccountPolicyConfig::new(AccountId::new(), computation, rate);
    raw.lumpsum_computation_type = lumpsum;
    raw.fines_maturity = Decimal::from(2);
    LoanPolicy {
        policy: AccountPolicy::from_config(raw).unwrap(),
        accounts: LoanAccounts {
            loan_receivable: AccountId::new(),
            interest_receivable: AccountId::new(),
            interest_income: AccountId::new(),
            unearned_interest: AccountId::new(),
            fines_receivable: AccountId::new(),
            unearned_fines: AccountId::new(),
            cash: AccountId::new(),
        },
        automatic_deductions: vec![
            AutomaticLoanDeduction::percentage(AccountId::new(), "Service fee", fee_percent, false),
            AutomaticLoanDeduction::percentage(AccountId::new(), "Insurance", fee_percent, true),
        ],
        charges_schemes: vec![],
        member_type_id: None,
        released_on: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        previous_balance: Decimal::ZERO,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Debits equal credits, every entry is one-sided, and the entries
    /// before the cash line net to the proceeds.
    #[test]
    fn prop_entry_set_balances(
        principal in principal_strategy(),
        rate in rate_strategy(),
        computation in computation_strategy(),
        lumpsum in lumpsum_strategy(),
        mode in mode_strategy(),
        terms in 1u32..=24,
        fee in (0i64..=500i64).prop_map(|n| Decimal::new(n, 2)),
    ) {
        let loan = loan(computation, rate, lumpsum, fee);
        let set = AmortizationBuilder::default()
            .build_entries(&loan, principal, terms, mode)
            .unwrap();

        prop_assert_eq!(set.total_debit(), set.total_credit());
        for entry in &set.entries {
            prop_assert!(entry.debit.is_zero() != entry.credit.is_zero());
            prop_assert!(entry.debit >= Decimal::ZERO && entry.credit >= Decimal::ZERO);
        }
        let cash = set.entries.last().unwrap();
        prop_assert_eq!(cash.kind, LoanEntryKind::Static);
        prop_assert_eq!(cash.credit, set.proceeds);
        prop_assert_eq!(set.proceeds, principal - set.total_deductions);
    }

    /// Principal due across the schedule repays the loan exactly.
    #[test]
    fn prop_schedule_repays_principal(
        principal in principal_strategy(),
        rate in rate_strategy(),
        computation in computation_strategy(),
        mode in mode_strategy(),
        terms in 1u32..=24,
    ) {
        let loan = loan(computation, rate, LumpsumComputation::None, Decimal::ZERO);
        let set = AmortizationBuilder::default()
            .build_entries(&loan, principal, terms, mode)
            .unwrap();

        let repaid: Decimal = set.schedule.iter().map(|p| p.principal).sum();
        prop_assert_eq!(repaid, principal);
        prop_assert_eq!(set.schedule.last().unwrap().balance, Decimal::ZERO);
        let interest: Decimal = set.schedule.iter().map(|p| p.interest).sum();
        prop_assert_eq!(interest, set.total_interest);
    }
}
