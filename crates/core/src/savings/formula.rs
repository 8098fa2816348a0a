//! Savings interest formulas.
//!
//! Interest = balance-days × rate / 100 / annual divisor, rounded half-up
//! to cents. Balance-days is the formula's base balance times the days in
//! range, except for the monthly-end total where every month-end balance
//! earns for its own month.

use rust_decimal::Decimal;

use coopledger_shared::types::{percent_of, round_money};

use super::balances::DailyBalances;
use super::types::SavingsComputationType;

/// Days a lowest or month-end formula needs before it pays interest.
pub const MIN_DAYS_FOR_LOWEST: usize = 30;

/// Base balance of a formula.
#[must_use]
pub fn interest_base(kind: SavingsComputationType, balances: &DailyBalances) -> Decimal {
    let months = balances.months();
    let count = |n: usize| Decimal::from(n.max(1));
    match kind {
        SavingsComputationType::DailyLowestBalance => balances.lowest(),
        SavingsComputationType::AverageDailyBalance => balances.average(),
        SavingsComputationType::MonthlyEndLowestBalance => months
            .iter()
            .map(|m| m.end)
            .min()
            .unwrap_or(Decimal::ZERO),
        SavingsComputationType::AdbEndBalance => balances.average().min(balances.ending()),
        SavingsComputationType::MonthlyLowestBalanceAverage => {
            months.iter().map(|m| m.lowest).sum::<Decimal>() / count(months.len())
        }
        SavingsComputationType::MonthlyEndBalanceAverage | SavingsComputationType::MonthlyEndBalanceTotal => {
            months.iter().map(|m| m.end).sum::<Decimal>() / count(months.len())
        }
    }
}

/// Balance-days of a formula.
#[must_use]
pub fn balance_days(kind: SavingsComputationType, balances: &DailyBalances) -> Decimal {
    match kind {
        SavingsComputationType::AverageDailyBalance => balances.sum(),
        SavingsComputationType::MonthlyEndBalanceTotal => balances
            .months()
            .iter()
            .map(|m| m.end * Decimal::from(m.days))
            .sum(),
        _ => interest_base(kind, balances) * Decimal::from(balances.days()),
    }
}

/// Interest for a range, rounded to cents. Never negative.
#[must_use]
pub fn compute_savings_interest(
    kind: SavingsComputationType,
    balances: &DailyBalances,
    annual_rate: Decimal,
    annual_divisor: u32,
) -> Decimal {
    if annual_divisor == 0 || balances.is_empty() {
        return Decimal::ZERO;
    }
    if kind.needs_full_month() && balances.days() < MIN_DAYS_FOR_LOWEST {
        return Decimal::ZERO;
    }
    let base = balance_days(kind, balances);
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(percent_of(base, annual_rate) / Decimal::from(annual_divisor))
}

/// Withholding tax on interest, rounded to cents.
#[must_use]
pub fn compute_interest_tax(interest: Decimal, tax_rate: Decimal, taxable: bool) -> Decimal {
    if !taxable || interest <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(percent_of(interest, tax_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn january_february() -> DailyBalances {
        // Jan: 10,000 with a dip to 4,000 on the 15th; Feb (29 days): 12,000,
        // falling to 6,000 on the last day.
        let mut values = vec![dec!(10000); 31];
        values[14] = dec!(4000);
        values.extend(vec![dec!(12000); 28]);
        values.push(dec!(6000));
        DailyBalances::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), values)
    }

    #[rstest]
    #[case(SavingsComputationType::DailyLowestBalance, dec!(4000))]
    #[case(SavingsComputationType::MonthlyEndLowestBalance, dec!(6000))]
    #[case(SavingsComputationType::AdbEndBalance, dec!(6000))]
    #[case(SavingsComputationType::MonthlyLowestBalanceAverage, dec!(5000))]
    #[case(SavingsComputationType::MonthlyEndBalanceAverage, dec!(8000))]
    fn test_interest_base(#[case] kind: SavingsComputationType, #[case] expected: Decimal) {
        assert_eq!(interest_base(kind, &january_february()), expected);
    }

    #[test]
    fn test_average_daily_balance() {
        let balances = january_february();
        // (30 × 10,000 + 4,000 + 28 × 12,000 + 6,000) / 60
        assert_eq!(balances.sum(), dec!(646000));
        let interest = compute_savings_interest(
            SavingsComputationType::AverageDailyBalance,
            &balances,
            dec!(3),
            360,
        );
        // 646,000 × 3% / 360 = 53.8333…
        assert_eq!(interest, dec!(53.83));
    }

    #[test]
    fn test_monthly_end_total() {
        let balances = january_february();
        let interest = compute_savings_interest(
            SavingsComputationType::MonthlyEndBalanceTotal,
            &balances,
            dec!(2),
            365,
        );
        // (10,000 × 31 + 6,000 × 29) × 2% / 365 = 26.5205…
        assert_eq!(interest, dec!(26.52));
    }

    #[test]
    fn test_daily_lowest_half_up() {
        let balances = DailyBalances::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            vec![dec!(1825); 30],
        );
        // 1,825 × 30 × 1% / 365 = 1.50 exactly; 0.5% gives 0.75
        let one = compute_savings_interest(SavingsComputationType::DailyLowestBalance, &balances, dec!(1), 365);
        assert_eq!(one, dec!(1.50));
        let balances = DailyBalances::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            vec![dec!(73); 30],
        );
        // 73 × 30 × 1% / 365 = 0.06; at 0.125%: 0.0075 → 0.01
        let tiny = compute_savings_interest(SavingsComputationType::DailyLowestBalance, &balances, dec!(0.125), 365);
        assert_eq!(tiny, dec!(0.01));
    }

    #[test]
    fn test_short_range_pays_nothing_for_lowest() {
        let balances = DailyBalances::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            vec![dec!(10000); 29],
        );
        assert_eq!(
            compute_savings_interest(SavingsComputationType::DailyLowestBalance, &balances, dec!(5), 365),
            Decimal::ZERO
        );
        assert!(
            compute_savings_interest(SavingsComputationType::AverageDailyBalance, &balances, dec!(5), 365)
                > Decimal::ZERO
        );
    }

    #[test]
    fn test_negative_base_pays_nothing() {
        let balances = DailyBalances::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            vec![dec!(-50); 31],
        );
        assert_eq!(
            compute_savings_interest(SavingsComputationType::AverageDailyBalance, &balances, dec!(5), 365),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_tax() {
        assert_eq!(compute_interest_tax(dec!(53.83), dec!(20), true), dec!(10.77));
        assert_eq!(compute_interest_tax(dec!(53.83), dec!(20), false), Decimal::ZERO);
        assert_eq!(compute_interest_tax(dec!(-25), dec!(20), true), Decimal::ZERO);
    }
}
