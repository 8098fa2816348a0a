//! Daily ending balances reconstructed from ledger rows.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;

use crate::posting::{AccountTypeForBalance, GeneralLedgerRow, signed_change};

/// Balances of one month inside a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBalances {
    /// Lowest daily ending balance.
    pub lowest: Decimal,
    /// Ending balance of the month's last day in range.
    pub end: Decimal,
    /// Σ daily ending balances.
    pub sum: Decimal,
    /// Days of the month in range.
    pub days: u32,
}

/// Ending balance of every day in `[from, to)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBalances {
    from: NaiveDate,
    balances: Vec<Decimal>,
}

impl DailyBalances {
    /// Reconstructs daily balances from the rows of one (member, account)
    /// key, seen from the account's normal side.
    ///
    /// Rows are ordered by entry date, then by posting time, so a backdated
    /// row counts from its own date. The opening balance sums every row
    /// dated before `from`; each day in range adds the rows dated that day.
    #[must_use]
    pub fn from_rows(
        rows: &[GeneralLedgerRow],
        normal: AccountTypeForBalance,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        let mut ordered: Vec<&GeneralLedgerRow> = rows.iter().filter(|r| r.entry_date < to).collect();
        ordered.sort_by_key(|r| (r.entry_date, r.created_at, r.ledger_version));

        let mut opening = Decimal::ZERO;
        let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for row in ordered {
            let change = normal.present(signed_change(row.debit, row.credit));
            if row.entry_date < from {
                opening += change;
            } else {
                *by_day.entry(row.entry_date).or_default() += change;
            }
        }

        let mut balances = Vec::new();
        let mut current = opening;
        let mut day = from;
        while day < to {
            if let Some(change) = by_day.get(&day) {
                current += *change;
            }
            balances.push(current);
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }
        Self { from, balances }
    }

    /// Balances given directly, starting at `from`.
    #[must_use]
    pub fn new(from: NaiveDate, balances: Vec<Decimal>) -> Self {
        Self { from, balances }
    }

    /// Number of days.
    #[must_use]
    pub fn days(&self) -> usize {
        self.balances.len()
    }

    /// Returns true for an empty range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Balance of the last day.
    #[must_use]
    pub fn ending(&self) -> Decimal {
        self.balances.last().copied().unwrap_or(Decimal::ZERO)
    }

    /// Lowest daily balance.
    #[must_use]
    pub fn lowest(&self) -> Decimal {
        self.balances.iter().copied().min().unwrap_or(Decimal::ZERO)
    }

    /// Σ daily balances.
    #[must_use]
    pub fn sum(&self) -> Decimal {
        self.balances.iter().copied().sum()
    }

    /// Average daily balance, unrounded.
    #[must_use]
    pub fn average(&self) -> Decimal {
        if self.balances.is_empty() {
            return Decimal::ZERO;
        }
        self.sum() / Decimal::from(self.balances.len())
    }

    /// Balances grouped by calendar month, in order.
    #[must_use]
    pub fn months(&self) -> Vec<MonthBalances> {
        let mut months: Vec<MonthBalances> = Vec::new();
        let mut last_key = None;
        let mut day = self.from;
        for balance in &self.balances {
            let key = (day.year(), day.month());
            match months.last_mut() {
                Some(month) if last_key == Some(key) => {
                    month.lowest = month.lowest.min(*balance);
                    month.end = *balance;
                    month.sum += *balance;
                    month.days += 1;
                }
                _ => months.push(MonthBalances {
                    lowest: *balance,
                    end: *balance,
                    sum: *balance,
                    days: 1,
                }),
            }
            last_key = Some(key);
            day = day.checked_add_days(Days::new(1)).unwrap_or(day);
        }
        months
    }
}
