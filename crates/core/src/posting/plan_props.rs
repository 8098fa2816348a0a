//! Property-based tests for posting plans.
//!
//! - Every accepted plan balances exactly
//! - Σ(debit - credit) over a key's rows reproduces its cached balance
//! - Row versions on a key are consecutive

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use coopledger_shared::types::{AccountId, BranchId, MemberId, OrganizationId, Scope, UserId};

use super::account::{AccountInfo, AccountKind};
use super::balance::replay_balance;
use super::entry::{GeneralLedgerRow, LedgerKey};
use super::event::{EventContext, EventKind, FinancialEvent};
use super::plan::PostingPlan;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn event_strategy() -> impl Strategy<Value = Vec<(bool, usize, Decimal)>> {
    prop::collection::vec((any::<bool>(), 0usize..3, amount_strategy()), 1..=30)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_replay_matches_cached_balances(events in event_strategy()) {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        let cash = AccountInfo::new(AccountId::new(), "Cash", AccountKind::Cash);
        let savings = AccountInfo::new(AccountId::new(), "Savings", AccountKind::Savings);
        let accounts: BTreeMap<_, _> =
            [(cash.id, cash.clone()), (savings.id, savings.clone())].into_iter().collect();
        let members = [MemberId::new(), MemberId::new(), MemberId::new()];
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let mut ledgers = BTreeMap::new();
        let mut rows: Vec<GeneralLedgerRow> = Vec::new();

        for (deposit, member, amount) in events {
            let kind = if deposit {
                EventKind::Deposit {
                    member_id: members[member],
                    savings_account: savings.id,
                    cash_account: cash.id,
                    amount,
                }
            } else {
                EventKind::Withdrawal {
                    member_id: members[member],
                    savings_account: savings.id,
                    cash_account: cash.id,
                    amount,
                }
            };
            let event = FinancialEvent::new(EventContext::new(scope, UserId::new(), date), kind);
            let plan = PostingPlan::from_event(&event).unwrap();
            prop_assert_eq!(plan.totals().debit, plan.totals().credit);
            rows.extend(plan.apply(&mut ledgers, &accounts, Utc::now()).unwrap());
        }

        let debit: Decimal = rows.iter().map(|r| r.debit).sum();
        let credit: Decimal = rows.iter().map(|r| r.credit).sum();
        prop_assert_eq!(debit, credit);

        for (key, ledger) in &ledgers {
            let key_rows: Vec<_> = rows.iter().filter(|r| r.key() == *key).collect();
            let replayed: Decimal = key_rows.iter().map(|r| r.debit - r.credit).sum();
            prop_assert_eq!(replayed, ledger.balance);
            prop_assert_eq!(replay_balance(key_rows.iter().copied()), ledger.balance);
            for (i, row) in key_rows.iter().enumerate() {
                prop_assert_eq!(row.ledger_version, i as u64 + 1);
            }
            prop_assert_eq!(ledger.version, key_rows.len() as u64);
        }

        let cash_key = LedgerKey::new(None, cash.id);
        let member_total: Decimal = ledgers
            .iter()
            .filter(|(k, _)| k.account_id == savings.id)
            .map(|(_, l)| l.normal_balance(savings.normal))
            .sum();
        prop_assert_eq!(ledgers[&cash_key].balance, member_total);
    }
}
