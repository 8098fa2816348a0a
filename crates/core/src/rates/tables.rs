//! Rate tables.
//!
//! Every table is a list of bands over some key (days, amount, year, date or
//! term). Bands within one table never overlap, so at most one band covers
//! any key and lookups are deterministic.

use std::fmt::Display;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::{AccountId, MemberTypeId};

use super::error::RateError;
use super::policy::LoanModeOfPayment;

/// Number of wide term columns (`Rate1..Rate22`, `Column1..Column22`).
pub const TERM_COLUMNS: usize = 22;

/// A dense row of 22 term-indexed values.
///
/// Index 0 holds the value for the first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRates(pub [Decimal; TERM_COLUMNS]);

impl TermRates {
    /// Builds a row from leading columns; missing columns are zero.
    ///
    /// # Errors
    ///
    /// Returns `RateError::InvalidTerms` when more than 22 values are given.
    pub fn from_slice(values: &[Decimal]) -> Result<Self, RateError> {
        if values.len() > TERM_COLUMNS {
            return Err(RateError::InvalidTerms(format!(
                "{} term columns given, at most {TERM_COLUMNS} supported",
                values.len()
            )));
        }
        let mut row = [Decimal::ZERO; TERM_COLUMNS];
        row[..values.len()].copy_from_slice(values);
        Ok(Self(row))
    }

    /// Value of the 1-based column `term`, clamped to the last column.
    ///
    /// Returns `None` for term 0.
    #[must_use]
    pub fn for_term(&self, term: u32) -> Option<Decimal> {
        let index = usize::try_from(term).ok()?.checked_sub(1)?;
        Some(self.0[index.min(TERM_COLUMNS - 1)])
    }

    /// Value at a 0-based column index.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Decimal> {
        self.0.get(index).copied()
    }
}

/// Checks that no band is inverted and no two bands overlap.
fn check_bands<K>(table: &'static str, mut bounds: Vec<(K, K)>) -> Result<(), RateError>
where
    K: Ord + Copy + Display,
{
    for (from, to) in &bounds {
        if from > to {
            return Err(RateError::InvertedBand {
                table,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }
    bounds.sort_by_key(|(from, _)| *from);
    for pair in bounds.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second.0 <= first.1 {
            return Err(RateError::OverlappingBands {
                table,
                first: format!("{}-{}", first.0, first.1),
                second: format!("{}-{}", second.0, second.1),
            });
        }
    }
    Ok(())
}

fn no_band(table: &'static str, value: impl Display) -> RateError {
    RateError::NoMatchingBand {
        table,
        value: value.to_string(),
    }
}

// ============================================================================
// Fines
// ============================================================================

/// One `FinesMaturity` row: days past due `[from_days, to_days]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesBand {
    /// First day covered.
    pub from_days: u32,
    /// Last day covered.
    pub to_days: u32,
    /// Fines rate in percent.
    pub rate: Decimal,
}

/// Fines rate by days past due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesMaturityTable {
    bands: Vec<FinesBand>,
}

impl FinesMaturityTable {
    /// Table name used in errors.
    pub const NAME: &'static str = "fines maturity";

    /// Validates and builds the table.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBand` or `OverlappingBands`.
    pub fn new(mut bands: Vec<FinesBand>) -> Result<Self, RateError> {
        check_bands(
            Self::NAME,
            bands.iter().map(|b| (b.from_days, b.to_days)).collect(),
        )?;
        bands.sort_by_key(|b| b.from_days);
        Ok(Self { bands })
    }

    /// Re-checks a deserialized table.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBand` or `OverlappingBands`.
    pub fn validate(&self) -> Result<(), RateError> {
        check_bands(
            Self::NAME,
            self.bands.iter().map(|b| (b.from_days, b.to_days)).collect(),
        )
    }

    /// Rate of the band covering `days_past_due`.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingBand` if no band covers the value.
    pub fn lookup(&self, days_past_due: u32) -> Result<Decimal, RateError> {
        self.bands
            .iter()
            .find(|b| b.from_days <= days_past_due && days_past_due <= b.to_days)
            .map(|b| b.rate)
            .ok_or_else(|| no_band(Self::NAME, format!("{days_past_due} days")))
    }

    /// The validated bands, ordered by `from_days`.
    #[must_use]
    pub fn bands(&self) -> &[FinesBand] {
        &self.bands
    }
}

// ============================================================================
// Interest rate tables
// ============================================================================

/// Interest rate for an inclusive range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearBand {
    /// First year.
    pub from_year: i32,
    /// Last year.
    pub to_year: i32,
    /// Annual rate in percent.
    pub rate: Decimal,
}

/// Interest rate for an inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBand {
    /// First day.
    pub from: NaiveDate,
    /// Last day.
    pub to: NaiveDate,
    /// Annual rate in percent.
    pub rate: Decimal,
}

/// Interest rate for an inclusive amount range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBand {
    /// Lowest amount.
    pub from: Decimal,
    /// Highest amount.
    pub to: Decimal,
    /// Annual rate in percent.
    pub rate: Decimal,
}

/// Interest rate table overriding an account's standard rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "rows", rename_all = "snake_case")]
pub enum InterestRateTable {
    /// Keyed by calendar year of the query date.
    ByYear(Vec<YearBand>),
    /// Keyed by the query date.
    ByDate(Vec<DateBand>),
    /// Keyed by principal or balance.
    ByAmount(Vec<AmountBand>),
    /// Keyed by loan term (1-22).
    ByTerm(TermRates),
}

impl InterestRateTable {
    /// Table name used in errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ByYear(_) => "interest rate by year",
            Self::ByDate(_) => "interest rate by date",
            Self::ByAmount(_) => "interest rate by amount",
            Self::ByTerm(_) => "interest rate by term",
        }
    }

    /// Checks that bands are ordered and disjoint.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBand` or `OverlappingBands`.
    pub fn validate(&self) -> Result<(), RateError> {
        let name = self.name();
        match self {
            Self::ByYear(rows) => {
                check_bands(name, rows.iter().map(|r| (r.from_year, r.to_year)).collect())
            }
            Self::ByDate(rows) => check_bands(name, rows.iter().map(|r| (r.from, r.to)).collect()),
            Self::ByAmount(rows) => check_bands(name, rows.iter().map(|r| (r.from, r.to)).collect()),
            Self::ByTerm(_) => Ok(()),
        }
    }

    /// Annual rate for the given date, amount and term.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingBand` if no row covers the relevant key.
    pub fn lookup(&self, date: NaiveDate, amount: Decimal, term: u32) -> Result<Decimal, RateError> {
        let name = self.name();
        match self {
            Self::ByYear(rows) => {
                let year = date.year();
                rows.iter()
                    .find(|r| r.from_year <= year && year <= r.to_year)
                    .map(|r| r.rate)
                    .ok_or_else(|| no_band(name, year))
            }
            Self::ByDate(rows) => rows
                .iter()
                .find(|r| r.from <= date && date <= r.to)
                .map(|r| r.rate)
                .ok_or_else(|| no_band(name, date)),
            Self::ByAmount(rows) => rows
                .iter()
                .find(|r| r.from <= amount && amount <= r.to)
                .map(|r| r.rate)
                .ok_or_else(|| no_band(name, amount)),
            Self::ByTerm(rates) => rates
                .for_term(term)
                .ok_or_else(|| no_band(name, format!("term {term}"))),
        }
    }
}

// ============================================================================
// Charges rate schemes
// ============================================================================

/// Discriminant of a charges scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargesRateSchemeType {
    /// Amount band with percent, flat and minimum charge.
    ByRange,
    /// Amount band by term header columns, filtered by member type and mode.
    ByType,
    /// Rates by mode of payment and term.
    ByTerm,
}

/// One `ChargesRateByRangeOrMinimumAmount` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCharge {
    /// Lowest principal covered.
    pub from: Decimal,
    /// Highest principal covered.
    pub to: Decimal,
    /// Percent of principal; takes precedence over `charge_amount` when non-zero.
    pub charge_percent: Decimal,
    /// Flat charge.
    pub charge_amount: Decimal,
    /// Minimum amount; replaces the charge once the charge reaches it.
    pub minimum_amount: Decimal,
}

/// One `ChargesRateSchemeModeOfPayment` row: an amount band over 22 columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeOfPaymentBand {
    /// Lowest principal covered.
    pub from: Decimal,
    /// Highest principal covered.
    pub to: Decimal,
    /// Rate per term header column, in percent.
    pub columns: TermRates,
}

/// One `ChargesRateByTerm` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCharge {
    /// Mode of payment this row applies to.
    pub mode_of_payment: LoanModeOfPayment,
    /// Rate per term, in percent.
    pub rates: TermRates,
}

/// Rows of a charges scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChargesRateRows {
    /// Range or minimum amount rows.
    ByRange {
        /// Bands ordered by `from`.
        bands: Vec<RangeCharge>,
    },
    /// Header-column rows.
    ByType {
        /// Restrict to a member type.
        member_type_id: Option<MemberTypeId>,
        /// Restrict to a mode of payment.
        mode_of_payment: Option<LoanModeOfPayment>,
        /// Term header of each column.
        headers: [u32; TERM_COLUMNS],
        /// Amount bands.
        bands: Vec<ModeOfPaymentBand>,
    },
    /// Per mode-of-payment term rows.
    ByTerm {
        /// At most one row per mode of payment.
        rows: Vec<TermCharge>,
    },
}

/// A charges rate scheme attached to a loan account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargesRateScheme {
    /// Display name, used as the entry description.
    pub name: String,
    /// Account credited with the charge.
    pub account_id: AccountId,
    /// Scheme rows.
    pub rows: ChargesRateRows,
}

/// Loan context needed to price a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeContext {
    /// Loan principal.
    pub principal: Decimal,
    /// Loan terms in months.
    pub terms: u32,
    /// Mode of payment.
    pub mode_of_payment: LoanModeOfPayment,
    /// Borrower's member type.
    pub member_type_id: Option<MemberTypeId>,
}

impl ChargesRateScheme {
    /// Validates and builds a scheme.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBand` or `OverlappingBands`, including two `ByTerm`
    /// rows for the same mode of payment.
    pub fn new(name: impl Into<String>, account_id: AccountId, rows: ChargesRateRows) -> Result<Self, RateError> {
        let mut scheme = Self {
            name: name.into(),
            account_id,
            rows,
        };
        scheme.validate()?;
        match &mut scheme.rows {
            ChargesRateRows::ByRange { bands } => bands.sort_by_key(|b| b.from),
            ChargesRateRows::ByType { bands, .. } => bands.sort_by_key(|b| b.from),
            ChargesRateRows::ByTerm { .. } => {}
        }
        Ok(scheme)
    }

    /// Discriminant of this scheme.
    #[must_use]
    pub fn scheme_type(&self) -> ChargesRateSchemeType {
        match self.rows {
            ChargesRateRows::ByRange { .. } => ChargesRateSchemeType::ByRange,
            ChargesRateRows::ByType { .. } => ChargesRateSchemeType::ByType,
            ChargesRateRows::ByTerm { .. } => ChargesRateSchemeType::ByTerm,
        }
    }

    /// Checks band ordering and uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBand` or `OverlappingBands`.
    pub fn validate(&self) -> Result<(), RateError> {
        match &self.rows {
            ChargesRateRows::ByRange { bands } => check_bands(
                "charges by range",
                bands.iter().map(|b| (b.from, b.to)).collect(),
            ),
            ChargesRateRows::ByType { bands, .. } => check_bands(
                "charges by type",
                bands.iter().map(|b| (b.from, b.to)).collect(),
            ),
            ChargesRateRows::ByTerm { rows } => {
                for (i, row) in rows.iter().enumerate() {
                    if rows[..i].iter().any(|r| r.mode_of_payment == row.mode_of_payment) {
                        return Err(RateError::OverlappingBands {
                            table: "charges by term",
                            first: format!("{:?}", row.mode_of_payment),
                            second: format!("{:?}", row.mode_of_payment),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Unrounded charge for a loan.
    ///
    /// `ByType` and `ByTerm` rates are monthly and are scaled to the mode of
    /// payment; schedules without a monthly scale carry no such charge.
    /// A `ByType` scheme whose member type or mode filter does not match
    /// the loan does not apply and yields zero.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingBand` if no row covers the principal or term.
    pub fn charge(&self, ctx: &ChargeContext) -> Result<Decimal, RateError> {
        let hundred = Decimal::ONE_HUNDRED;
        match &self.rows {
            ChargesRateRows::ByRange { bands } => {
                let band = bands
                    .iter()
                    .find(|b| b.from <= ctx.principal && ctx.principal <= b.to)
                    .ok_or_else(|| no_band("charges by range", ctx.principal))?;
                let charge = if band.charge_percent > Decimal::ZERO {
                    ctx.principal * band.charge_percent / hundred
                } else {
                    band.charge_amount
                };
                if band.minimum_amount > Decimal::ZERO && charge >= band.minimum_amount {
                    return Ok(band.minimum_amount);
                }
                Ok(charge)
            }
            ChargesRateRows::ByType {
                member_type_id,
                mode_of_payment,
                headers,
                bands,
            } => {
                if member_type_id.is_some_and(|m| ctx.member_type_id != Some(m))
                    || mode_of_payment.is_some_and(|m| m != ctx.mode_of_payment)
                {
                    return Ok(Decimal::ZERO);
                }
                let band = bands
                    .iter()
                    .find(|b| b.from <= ctx.principal && ctx.principal <= b.to)
                    .ok_or_else(|| no_band("charges by type", ctx.principal))?;
                let column = headers
                    .iter()
                    .rposition(|h| *h > 0 && *h <= ctx.terms)
                    .ok_or_else(|| no_band("charges by type", format!("term {}", ctx.terms)))?;
                let rate = band.columns.column(column).unwrap_or_default();
                Ok(scaled(ctx.principal * rate / hundred, ctx.mode_of_payment))
            }
            ChargesRateRows::ByTerm { rows } => {
                let row = rows
                    .iter()
                    .find(|r| r.mode_of_payment == ctx.mode_of_payment)
                    .ok_or_else(|| {
                        no_band("charges by term", format!("{:?}", ctx.mode_of_payment))
                    })?;
                let rate = row
                    .rates
                    .for_term(ctx.terms)
                    .ok_or_else(|| no_band("charges by term", format!("term {}", ctx.terms)))?;
                Ok(scaled(ctx.principal * rate / hundred, ctx.mode_of_payment))
            }
        }
    }
}

fn scaled(monthly: Decimal, mode: LoanModeOfPayment) -> Decimal {
    mode.monthly_charge_scale()
        .map_or(Decimal::ZERO, |scale| monthly * scale)
}
