//! Savings interest generation.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::warn;

use coopledger_shared::types::{BranchSettings, GeneratedSavingsInterestId};

use super::balances::DailyBalances;
use super::error::SavingsError;
use super::formula::{compute_interest_tax, compute_savings_interest};
use super::types::{
    GeneratedSavingsInterest, GeneratedSavingsInterestEntry, SavingsCandidate, SavingsProduct,
    SavingsRunRequest, SavingsRunStatus,
};

/// Computes per-member savings interest for a run.
///
/// Pure: candidates are supplied by the caller and nothing is posted. The
/// per-member computation runs on the rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct SavingsInterestGenerator {
    settings: BranchSettings,
}

impl SavingsInterestGenerator {
    /// Creates a generator for a branch.
    #[must_use]
    pub fn new(settings: BranchSettings) -> Self {
        Self { settings }
    }

    /// Branch settings in use.
    #[must_use]
    pub fn settings(&self) -> BranchSettings {
        self.settings
    }

    /// Generates a pending run.
    ///
    /// Candidates failing the member type or closed filters are skipped, as
    /// are zero ending balances and zero interest. An ending balance below
    /// the product minimum yields a negative entry equal to the configured
    /// charge, or nothing when the charge is zero.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for an empty range and `InvalidSetting` for
    /// rates outside 0-100 or a zero annual divisor.
    pub fn generate(
        &self,
        request: SavingsRunRequest,
        product: &SavingsProduct,
        candidates: &[SavingsCandidate],
        now: DateTime<Utc>,
    ) -> Result<GeneratedSavingsInterest, SavingsError> {
        request.validate()?;
        let tax_rate = request
            .interest_tax_rate
            .unwrap_or(self.settings.tax_interest);
        check_percent("interest_tax_rate", tax_rate)?;
        check_percent("interest_rate", product.interest_rate)?;
        if self.settings.annual_divisor == 0 {
            return Err(SavingsError::InvalidSetting {
                field: "annual_divisor",
                value: Decimal::ZERO,
            });
        }
        if let Some(table) = &product.rate_table {
            table.validate()?;
        }

        let mut entries: Vec<GeneratedSavingsInterestEntry> = candidates
            .par_iter()
            .filter(|c| request.qualifies(c))
            .filter_map(|c| self.entry_for(&request, product, tax_rate, c))
            .collect();
        entries.sort_by_key(|e| e.member_id);

        Ok(GeneratedSavingsInterest {
            id: GeneratedSavingsInterestId::new(),
            account_id: product.account_id,
            interest_tax_rate: tax_rate,
            request,
            entries,
            status: SavingsRunStatus::Pending,
            generated_at: now,
            posted_at: None,
        })
    }

    fn entry_for(
        &self,
        request: &SavingsRunRequest,
        product: &SavingsProduct,
        tax_rate: Decimal,
        candidate: &SavingsCandidate,
    ) -> Option<GeneratedSavingsInterestEntry> {
        let balances = DailyBalances::from_rows(
            &candidate.rows,
            candidate.normal,
            request.last_computation_date,
            request.new_computation_date,
        );
        let ending = balances.ending();
        if ending.is_zero() {
            return None;
        }

        let (interest, tax) = if ending < product.minimum_balance {
            if product.below_minimum_charge.is_zero() {
                return None;
            }
            (-product.below_minimum_charge, Decimal::ZERO)
        } else {
            let rate = match &product.rate_table {
                Some(table) => match table.lookup(request.new_computation_date, ending, 1) {
                    Ok(rate) => rate,
                    Err(err) => {
                        warn!(
                            member_id = %candidate.member_id,
                            ending_balance = %ending,
                            error = %err,
                            "No savings rate band, base rate used"
                        );
                        product.interest_rate
                    }
                },
                None => product.interest_rate,
            };
            let interest = compute_savings_interest(
                request.computation_type,
                &balances,
                rate,
                self.settings.annual_divisor,
            );
            if interest.is_zero() {
                return None;
            }
            (interest, compute_interest_tax(interest, tax_rate, product.taxable))
        };

        Some(GeneratedSavingsInterestEntry {
            member_id: candidate.member_id,
            account_id: product.account_id,
            interest_amount: interest,
            interest_tax: tax,
            ending_balance: ending + interest - tax,
        })
    }
}

fn check_percent(field: &'static str, value: Decimal) -> Result<(), SavingsError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(SavingsError::InvalidSetting { field, value });
    }
    Ok(())
}
