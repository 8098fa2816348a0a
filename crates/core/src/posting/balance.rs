//! Running balances and the member accounting ledger.
//!
//! Every key stores `previous + debit - credit`, whatever the account's
//! normal side. Credit-normal accounts (member savings, income, payables)
//! therefore carry negative stored balances; [`AccountTypeForBalance::present`]
//! flips them for display.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::Scope;

use super::entry::{GeneralLedgerRow, LedgerKey};

/// Normal side of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTypeForBalance {
    /// Asset and expense accounts.
    #[default]
    DebitNormal,
    /// Liability, equity and revenue accounts.
    CreditNormal,
}

impl AccountTypeForBalance {
    /// A stored `debit - credit` amount seen from the account's normal side.
    #[must_use]
    pub fn present(self, signed: Decimal) -> Decimal {
        match self {
            Self::DebitNormal => signed,
            Self::CreditNormal => -signed,
        }
    }
}

/// Signed change a row makes to its key's stored balance.
#[must_use]
pub fn signed_change(debit: Decimal, credit: Decimal) -> Decimal {
    debit - credit
}

/// Balance before and after one row, with the key version after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Version after the row; the first row on a key is version 1.
    pub ledger_version: u64,
    /// Balance before the row.
    pub previous_balance: Decimal,
    /// Balance after the row.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Running balance for the first row on a key.
    #[must_use]
    pub fn first_entry(balance_change: Decimal) -> Self {
        Self {
            ledger_version: 1,
            previous_balance: Decimal::ZERO,
            current_balance: balance_change,
        }
    }

    /// Running balance for the row after `previous`.
    #[must_use]
    pub fn next_entry(previous: &Self, balance_change: Decimal) -> Self {
        Self {
            ledger_version: previous.ledger_version + 1,
            previous_balance: previous.current_balance,
            current_balance: previous.current_balance + balance_change,
        }
    }
}

/// Which accumulator of the member accounting ledger a line feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerComponent {
    /// Principal or deposit balance only.
    #[default]
    Principal,
    /// Interest accrued or paid.
    Interest,
    /// Fines accrued or paid.
    Fines,
    /// Other amounts added to the payable.
    Due,
}

/// Cached per-(member, account) state. Only the ledger poster writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAccountingLedger {
    /// Owning organization and branch.
    pub scope: Scope,
    /// Member and account.
    pub key: LedgerKey,
    /// Σ(debit - credit) of every row on the key.
    pub balance: Decimal,
    /// Interest accumulator.
    pub interest: Decimal,
    /// Fines accumulator.
    pub fines: Decimal,
    /// Other dues accumulator.
    pub due: Decimal,
    /// Date of the last payment or deposit.
    pub last_pay: Option<NaiveDate>,
    /// Number of rows posted to the key; used for optimistic concurrency.
    pub version: u64,
}

impl MemberAccountingLedger {
    /// An empty ledger at version 0.
    #[must_use]
    pub fn new(scope: Scope, key: LedgerKey) -> Self {
        Self {
            scope,
            key,
            balance: Decimal::ZERO,
            interest: Decimal::ZERO,
            fines: Decimal::ZERO,
            due: Decimal::ZERO,
            last_pay: None,
            version: 0,
        }
    }

    /// Running balance state of the last row.
    #[must_use]
    pub fn running(&self) -> RunningBalance {
        RunningBalance {
            ledger_version: self.version,
            previous_balance: self.balance,
            current_balance: self.balance,
        }
    }

    /// Balance seen from the account's normal side.
    #[must_use]
    pub fn normal_balance(&self, normal: AccountTypeForBalance) -> Decimal {
        normal.present(self.balance)
    }

    /// Applies one row's `debit - credit` change and returns the new running
    /// balance.
    pub fn apply(&mut self, change: Decimal, component: LedgerComponent) -> RunningBalance {
        let next = if self.version == 0 {
            RunningBalance::first_entry(change)
        } else {
            RunningBalance::next_entry(&self.running(), change)
        };
        self.balance = next.current_balance;
        self.version = next.ledger_version;
        match component {
            LedgerComponent::Principal => {}
            LedgerComponent::Interest => self.interest += change,
            LedgerComponent::Fines => self.fines += change,
            LedgerComponent::Due => self.due += change,
        }
        next
    }
}

/// Replays rows of one key and returns Σ(debit - credit).
#[must_use]
pub fn replay_balance<'a>(rows: impl IntoIterator<Item = &'a GeneralLedgerRow>) -> Decimal {
    rows.into_iter()
        .map(|row| signed_change(row.debit, row.credit))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopledger_shared::types::{AccountId, BranchId, MemberId, OrganizationId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn ledger() -> MemberAccountingLedger {
        MemberAccountingLedger::new(
            Scope::new(OrganizationId::new(), BranchId::new()),
            LedgerKey::new(Some(MemberId::new()), AccountId::new()),
        )
    }

    #[test]
    fn test_present_by_normal_side() {
        let stored = signed_change(dec!(30), dec!(100));
        assert_eq!(stored, dec!(-70));
        assert_eq!(AccountTypeForBalance::DebitNormal.present(stored), dec!(-70));
        assert_eq!(AccountTypeForBalance::CreditNormal.present(stored), dec!(70));

        let mut ledger = ledger();
        ledger.apply(stored, LedgerComponent::Principal);
        assert_eq!(ledger.balance, dec!(-70));
        assert_eq!(ledger.normal_balance(AccountTypeForBalance::CreditNormal), dec!(70));
    }

    #[test]
    fn test_apply_tracks_components() {
        let mut ledger = ledger();
        let first = ledger.apply(dec!(1000), LedgerComponent::Principal);
        assert_eq!(first.ledger_version, 1);
        assert_eq!(first.previous_balance, Decimal::ZERO);

        let second = ledger.apply(dec!(120), LedgerComponent::Interest);
        assert_eq!(second.previous_balance, dec!(1000));
        assert_eq!(second.current_balance, dec!(1120));
        assert_eq!(ledger.interest, dec!(120));
        assert_eq!(ledger.version, 2);

        ledger.apply(dec!(-20), LedgerComponent::Fines);
        assert_eq!(ledger.fines, dec!(-20));
        assert_eq!(ledger.balance, dec!(1100));
    }

    fn balance_change_strategy() -> impl Strategy<Value = Decimal> {
        (-100_000i64..100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The final balance equals the sum of changes and the version
        /// equals the number of rows.
        #[test]
        fn prop_chain_sums_changes(
            changes in prop::collection::vec(balance_change_strategy(), 1..=20),
        ) {
            let mut ledger = ledger();
            let mut previous: Option<RunningBalance> = None;
            for change in &changes {
                let next = ledger.apply(*change, LedgerComponent::Principal);
                if let Some(prev) = previous {
                    prop_assert_eq!(next.previous_balance, prev.current_balance);
                    prop_assert_eq!(next.ledger_version, prev.ledger_version + 1);
                }
                previous = Some(next);
            }
            let expected: Decimal = changes.iter().copied().sum();
            prop_assert_eq!(ledger.balance, expected);
            prop_assert_eq!(ledger.version, changes.len() as u64);
        }
    }
}
