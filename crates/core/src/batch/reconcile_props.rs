//! Property-based tests for batch classification.
//!
//! - Every difference maps to exactly one status
//! - The variance posting equals the absolute difference and balances

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use coopledger_shared::types::{AccountId, BranchId, OrganizationId, Scope, UserId};

use super::reconcile::{BatchTotals, classify, variance_event};
use super::types::{TransactionBatch, TransactionBatchBalanceStatus, UnbalancedAccount};
use crate::posting::{EventKind, PostingPlan};

fn cents() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_classification_is_exhaustive(handled in cents(), supposed in cents()) {
        let status = classify(handled, supposed);
        let diff = handled - supposed;
        let expected = if diff.is_zero() {
            TransactionBatchBalanceStatus::Balanced
        } else if diff > Decimal::ZERO {
            TransactionBatchBalanceStatus::Overage
        } else {
            TransactionBatchBalanceStatus::Shortage
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn prop_variance_amount_is_absolute_difference(handled in cents(), supposed in cents()) {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        let batch = TransactionBatch::open(
            scope,
            UserId::new(),
            "PHP",
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        );
        let unbalanced =
            UnbalancedAccount::new(scope, "PHP", AccountId::new(), AccountId::new(), AccountId::new());
        let totals = BatchTotals {
            total_cash_handled: handled,
            total_supposed_remittance: supposed,
            ..BatchTotals::default()
        };

        match variance_event(&batch, &totals, &unbalanced, UserId::new()) {
            None => prop_assert_eq!(handled, supposed),
            Some(event) => {
                if let EventKind::BatchVariance { amount, .. } = &event.kind {
                    prop_assert_eq!(*amount, (handled - supposed).abs());
                }
                let plan = PostingPlan::from_event(&event).unwrap();
                prop_assert!(plan.totals().is_balanced);
                prop_assert_eq!(plan.totals().debit, (handled - supposed).abs());
            }
        }
    }
}
