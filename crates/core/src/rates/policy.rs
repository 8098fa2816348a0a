//! Account computation policies.
//!
//! Persistence stores an account's computation settings as many independent
//! flags. [`AccountPolicy::from_config`] is the only way to build a policy:
//! it validates the raw flags once and folds them into sum types, so the
//! resolver never sees a contradictory combination.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coopledger_shared::types::AccountId;

use super::error::RateError;
use super::tables::{FinesMaturityTable, InterestRateTable};

/// Longest configurable grace period, in days.
pub const MAX_GRACE_PERIOD_DAYS: i32 = 365;
/// Largest configurable grace cut-off, in days.
pub const MAX_CUT_OFF_DAYS: i32 = 30;
/// Largest configurable grace cut-off, in months.
pub const MAX_CUT_OFF_MONTHS: i32 = 12;

/// How often a loan is amortized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanModeOfPayment {
    /// Every day (30-day months).
    Daily,
    /// Every week.
    Weekly,
    /// Twice a month (15/30).
    SemiMonthly,
    /// Every month.
    Monthly,
    /// Every three months.
    Quarterly,
    /// Every six months.
    SemiAnnual,
    /// Once, at maturity.
    Lumpsum,
    /// Every given number of days.
    FixedDays(u32),
}

impl LoanModeOfPayment {
    /// Number of days covered by one amortization period.
    #[must_use]
    pub const fn days_per_period(self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::SemiMonthly => 15,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::SemiAnnual => 180,
            Self::Lumpsum => 360,
            Self::FixedDays(days) => days,
        }
    }

    /// Number of amortization periods in one year.
    ///
    /// Fixed-day schedules divide the branch's annual day count.
    #[must_use]
    pub fn periods_per_year(self, annual_divisor: u32) -> Decimal {
        match self {
            Self::Daily => Decimal::from(360),
            Self::Weekly => Decimal::from(52),
            Self::SemiMonthly => Decimal::from(24),
            Self::Monthly => Decimal::from(12),
            Self::Quarterly => Decimal::from(4),
            Self::SemiAnnual => Decimal::TWO,
            Self::Lumpsum => Decimal::ONE,
            Self::FixedDays(0) => Decimal::ZERO,
            Self::FixedDays(days) => Decimal::from(annual_divisor) / Decimal::from(days),
        }
    }

    /// Multiplier converting a monthly charge rate into a per-payment charge.
    ///
    /// `None` for schedules that carry no per-payment charge.
    #[must_use]
    pub fn monthly_charge_scale(self) -> Option<Decimal> {
        let thirty = Decimal::from(30);
        match self {
            Self::Daily => Some(Decimal::ONE / thirty),
            Self::Weekly => Some(Decimal::from(7) / thirty),
            Self::SemiMonthly => Some(Decimal::from(15) / thirty),
            Self::Monthly => Some(Decimal::ONE),
            Self::Quarterly => Some(Decimal::from(3)),
            Self::SemiAnnual => Some(Decimal::from(6)),
            Self::Lumpsum | Self::FixedDays(_) => None,
        }
    }
}

/// Raw computation family stored on the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationType {
    /// Flat rate on the original principal.
    Straight,
    /// Period rate on the declining balance.
    Diminishing,
    /// Declining balance re-based once a year.
    DiminishingStraight,
}

/// Diminishing sub-variant (`InterestFinesComputationDiminishing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiminishingVariant {
    /// Plain declining balance.
    #[default]
    None,
    /// Interest and fines follow each amortization's balance.
    ByAmortization,
    /// As `ByAmortization`, with fines charged on principal plus interest arrears.
    ByAmortizationDailyArrears,
}

/// Diminishing-straight sub-variant (`InterestFinesComputationDiminishingStraightYearly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StraightYearlyVariant {
    /// Period rate is the nominal rate over periods per year.
    #[default]
    None,
    /// Daily interest on the loan balance by year.
    ByDailyInterestBalance,
}

/// Validated computation policy: exactly one family is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "variant", rename_all = "snake_case")]
pub enum ComputationPolicy {
    /// Flat rate on the original principal.
    Straight,
    /// Period rate on the declining balance.
    Diminishing(DiminishingVariant),
    /// Declining balance re-based at the start of each loan year.
    DiminishingStraight(StraightYearlyVariant),
}

/// Lumpsum computation (`LumpsumComputationType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumpsumComputation {
    /// Interest spread across the term.
    #[default]
    None,
    /// Maturity fines accrued as an add-on at release.
    FinesMaturity,
    /// Interest for the whole term deferred to maturity.
    InterestMaturity,
    /// Interest for the whole term collected upfront from proceeds.
    AdvanceInterest,
}

/// Earned/unearned interest recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarnedUnearnedInterest {
    /// No unearned interest tracking.
    #[default]
    None,
    /// Earned by formula.
    ByFormula,
    /// Earned by formula plus actual payment.
    ByFormulaActualPay,
    /// Earned by advance interest plus actual payment.
    ByAdvanceInterestActual,
}

/// How a loan's savings component is ledgered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanSavingType {
    /// Separate ledger.
    #[default]
    Separate,
    /// Single ledger.
    SingleLedger,
    /// Single ledger if not zero.
    SingleLedgerIfNotZero,
    /// Single ledger, semi-monthly on the 15th and 30th.
    SingleLedgerSemi1530,
    /// Single ledger, semi-monthly within maturity.
    SingleLedgerSemiMaturity,
}

/// A window during which no interest or fines accrue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GracePeriod {
    /// Length of the window in days.
    pub days: u32,
}

impl GracePeriod {
    /// Creates a grace period.
    #[must_use]
    pub const fn new(days: u32) -> Self {
        Self { days }
    }

    /// Returns true if accrual is forced to zero at `elapsed_days`.
    #[must_use]
    pub const fn zeroes(self, elapsed_days: u32) -> bool {
        elapsed_days <= self.days
    }
}

/// Cut-off applied to grace periods by the payment scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraceCutOff {
    /// Day-of-period cut-off (0-30).
    pub days: u8,
    /// Month cut-off (0-12).
    pub months: u8,
}

/// Fines grace percentage by mode of payment (0-100).
///
/// A percentage reduces the fines rate proportionally; 100 waives fines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinesGracePercentages {
    /// Daily and fixed-days schedules.
    pub daily: Decimal,
    /// Weekly schedules.
    pub weekly: Decimal,
    /// Semi-monthly schedules.
    pub semi_monthly: Decimal,
    /// Monthly schedules.
    pub monthly: Decimal,
    /// Quarterly schedules.
    pub quarterly: Decimal,
    /// Semi-annual schedules.
    pub semi_annual: Decimal,
    /// Lumpsum schedules.
    pub lumpsum: Decimal,
}

impl FinesGracePercentages {
    /// Returns the percentage configured for a mode of payment.
    #[must_use]
    pub fn for_mode(&self, mode: LoanModeOfPayment) -> Decimal {
        match mode {
            LoanModeOfPayment::Daily | LoanModeOfPayment::FixedDays(_) => self.daily,
            LoanModeOfPayment::Weekly => self.weekly,
            LoanModeOfPayment::SemiMonthly => self.semi_monthly,
            LoanModeOfPayment::Monthly => self.monthly,
            LoanModeOfPayment::Quarterly => self.quarterly,
            LoanModeOfPayment::SemiAnnual => self.semi_annual,
            LoanModeOfPayment::Lumpsum => self.lumpsum,
        }
    }

    fn all(&self) -> [(&'static str, Decimal); 7] {
        [
            ("daily fines grace percentage", self.daily),
            ("weekly fines grace percentage", self.weekly),
            ("semi-monthly fines grace percentage", self.semi_monthly),
            ("monthly fines grace percentage", self.monthly),
            ("quarterly fines grace percentage", self.quarterly),
            ("semi-annual fines grace percentage", self.semi_annual),
            ("lumpsum fines grace percentage", self.lumpsum),
        ]
    }
}

/// Raw account computation settings as stored by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPolicyConfig {
    /// The account these settings belong to.
    pub account_id: AccountId,
    /// Computation family.
    pub computation_type: ComputationType,
    /// Diminishing sub-variant flag.
    #[serde(default)]
    pub interest_fines_computation_diminishing: DiminishingVariant,
    /// Diminishing-straight sub-variant flag.
    #[serde(default)]
    pub interest_fines_computation_diminishing_straight_yearly: StraightYearlyVariant,
    /// Lumpsum computation.
    #[serde(default)]
    pub lumpsum_computation_type: LumpsumComputation,
    /// Earned/unearned interest recognition.
    #[serde(default)]
    pub earned_unearned_interest: EarnedUnearnedInterest,
    /// Loan saving type.
    #[serde(default)]
    pub loan_saving_type: LoanSavingType,
    /// Annual interest rate in percent.
    pub interest_standard: Decimal,
    /// Fines rate during amortization, in percent.
    #[serde(default)]
    pub fines_amort: Decimal,
    /// Fines rate past maturity, in percent.
    #[serde(default)]
    pub fines_maturity: Decimal,
    /// Interest grace period in days.
    #[serde(default)]
    pub interest_grace_period_days: i32,
    /// Fines grace period during amortization, in days.
    #[serde(default)]
    pub fines_grace_period_amortization_days: i32,
    /// Fines grace period past maturity, in days.
    #[serde(default)]
    pub fines_grace_period_maturity_days: i32,
    /// Grace cut-off in days.
    #[serde(default)]
    pub grace_period_cut_off_days: i32,
    /// Grace cut-off in months.
    #[serde(default)]
    pub grace_period_cut_off_months: i32,
    /// Optional cap on the interest rate, in percent.
    #[serde(default)]
    pub max_interest_rate: Option<Decimal>,
    /// Optional cap on the fines rate, in percent.
    #[serde(default)]
    pub max_fines_rate: Option<Decimal>,
    /// Fines grace percentages by mode of payment.
    #[serde(default)]
    pub fines_grace_percentage: FinesGracePercentages,
    /// Ignore fines grace percentages entirely.
    #[serde(default)]
    pub no_grace_period_daily: bool,
    /// Interest rate table overriding `interest_standard`.
    #[serde(default)]
    pub interest_table: Option<InterestRateTable>,
    /// Fines rate table by days past due.
    #[serde(default)]
    pub fines_maturity_table: Option<FinesMaturityTable>,
}

/// A validated account computation policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountPolicy {
    /// The account this policy belongs to.
    pub account_id: AccountId,
    /// Active computation family.
    pub computation: ComputationPolicy,
    /// Lumpsum computation.
    pub lumpsum: LumpsumComputation,
    /// Earned/unearned interest recognition.
    pub earned_unearned_interest: EarnedUnearnedInterest,
    /// Loan saving type.
    pub loan_saving_type: LoanSavingType,
    /// Annual interest rate in percent.
    pub interest_standard: Decimal,
    /// Fines rate during amortization, in percent.
    pub fines_amort: Decimal,
    /// Fines rate past maturity, in percent.
    pub fines_maturity: Decimal,
    /// Interest grace period.
    pub interest_grace: GracePeriod,
    /// Fines grace period during amortization.
    pub fines_grace_amortization: GracePeriod,
    /// Fines grace period past maturity.
    pub fines_grace_maturity: GracePeriod,
    /// Grace cut-off.
    pub grace_cut_off: GraceCutOff,
    /// Interest rate cap.
    pub max_interest_rate: Option<Decimal>,
    /// Fines rate cap.
    pub max_fines_rate: Option<Decimal>,
    /// Fines grace percentages, `None` when disabled.
    pub fines_grace_percentage: Option<FinesGracePercentages>,
    /// Interest rate table.
    pub interest_table: Option<InterestRateTable>,
    /// Fines rate table by days past due.
    pub fines_maturity_table: Option<FinesMaturityTable>,
}

impl AccountPolicy {
    /// Validates raw settings and builds a policy.
    ///
    /// # Errors
    ///
    /// Returns `RateError::InvalidPolicy` when a sub-variant flag belongs to
    /// a family other than the active one, or a percentage or grace value is
    /// out of range.
    pub fn from_config(config: AccountPolicyConfig) -> Result<Self, RateError> {
        let account_id = config.account_id;
        let invalid = |reason: String| RateError::InvalidPolicy { account_id, reason };

        let diminishing = config.interest_fines_computation_diminishing;
        let straight_yearly = config.interest_fines_computation_diminishing_straight_yearly;

        let computation = match config.computation_type {
            ComputationType::Straight => {
                if diminishing != DiminishingVariant::None
                    || straight_yearly != StraightYearlyVariant::None
                {
                    return Err(invalid(
                        "straight account carries a diminishing sub-variant".to_string(),
                    ));
                }
                ComputationPolicy::Straight
            }
            ComputationType::Diminishing => {
                if straight_yearly != StraightYearlyVariant::None {
                    return Err(invalid(
                        "diminishing and diminishing-straight-yearly are both set".to_string(),
                    ));
                }
                ComputationPolicy::Diminishing(diminishing)
            }
            ComputationType::DiminishingStraight => {
                if diminishing != DiminishingVariant::None {
                    return Err(invalid(
                        "diminishing-straight account carries a diminishing sub-variant"
                            .to_string(),
                    ));
                }
                ComputationPolicy::DiminishingStraight(straight_yearly)
            }
        };

        let mut percentages = vec![
            ("interest standard", config.interest_standard),
            ("fines amortization rate", config.fines_amort),
            ("fines maturity rate", config.fines_maturity),
        ];
        if let Some(cap) = config.max_interest_rate {
            percentages.push(("interest cap", cap));
        }
        if let Some(cap) = config.max_fines_rate {
            percentages.push(("fines cap", cap));
        }
        percentages.extend(config.fines_grace_percentage.all());
        for (name, value) in percentages {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(invalid(format!("{name} {value} is outside 0-100")));
            }
        }

        let grace = |name: &str, days: i32| -> Result<GracePeriod, RateError> {
            let days = u32::try_from(days)
                .ok()
                .filter(|d| *d <= MAX_GRACE_PERIOD_DAYS.unsigned_abs())
                .ok_or_else(|| {
                    invalid(format!(
                        "{name} {days} must be between 0 and {MAX_GRACE_PERIOD_DAYS} days"
                    ))
                })?;
            Ok(GracePeriod::new(days))
        };
        let interest_grace = grace("interest grace period", config.interest_grace_period_days)?;
        let fines_grace_amortization = grace(
            "fines amortization grace period",
            config.fines_grace_period_amortization_days,
        )?;
        let fines_grace_maturity = grace(
            "fines maturity grace period",
            config.fines_grace_period_maturity_days,
        )?;

        let cut_off_days = u8::try_from(config.grace_period_cut_off_days)
            .ok()
            .filter(|d| i32::from(*d) <= MAX_CUT_OFF_DAYS)
            .ok_or_else(|| {
                invalid(format!(
                    "grace cut-off {} must be between 0 and {MAX_CUT_OFF_DAYS} days",
                    config.grace_period_cut_off_days
                ))
            })?;
        let cut_off_months = u8::try_from(config.grace_period_cut_off_months)
            .ok()
            .filter(|m| i32::from(*m) <= MAX_CUT_OFF_MONTHS)
            .ok_or_else(|| {
                invalid(format!(
                    "grace cut-off {} must be between 0 and {MAX_CUT_OFF_MONTHS} months",
                    config.grace_period_cut_off_months
                ))
            })?;

        if let Some(table) = &config.interest_table {
            table.validate()?;
        }
        if let Some(table) = &config.fines_maturity_table {
            table.validate()?;
        }

        Ok(Self {
            account_id,
            computation,
            lumpsum: config.lumpsum_computation_type,
            earned_unearned_interest: config.earned_unearned_interest,
            loan_saving_type: config.loan_saving_type,
            interest_standard: config.interest_standard,
            fines_amort: config.fines_amort,
            fines_maturity: config.fines_maturity,
            interest_grace,
            fines_grace_amortization,
            fines_grace_maturity,
            grace_cut_off: GraceCutOff {
                days: cut_off_days,
                months: cut_off_months,
            },
            max_interest_rate: config.max_interest_rate,
            max_fines_rate: config.max_fines_rate,
            fines_grace_percentage: (!config.no_grace_period_daily)
                .then_some(config.fines_grace_percentage),
            interest_table: config.interest_table,
            fines_maturity_table: config.fines_maturity_table,
        })
    }
}

impl AccountPolicyConfig {
    /// Minimal settings for an account of the given family and annual rate.
    #[must_use]
    pub fn new(account_id: AccountId, computation_type: ComputationType, interest_standard: Decimal) -> Self {
        Self {
            account_id,
            computation_type,
            interest_fines_computation_diminishing: DiminishingVariant::None,
            interest_fines_computation_diminishing_straight_yearly: StraightYearlyVariant::None,
            lumpsum_computation_type: LumpsumComputation::None,
            earned_unearned_interest: EarnedUnearnedInterest::None,
            loan_saving_type: LoanSavingType::Separate,
            interest_standard,
            fines_amort: Decimal::ZERO,
            fines_maturity: Decimal::ZERO,
            interest_grace_period_days: 0,
            fines_grace_period_amortization_days: 0,
            fines_grace_period_maturity_days: 0,
            grace_period_cut_off_days: 0,
            grace_period_cut_off_months: 0,
            max_interest_rate: None,
            max_fines_rate: None,
            fines_grace_percentage: FinesGracePercentages::default(),
            no_grace_period_daily: false,
            interest_table: None,
            fines_maturity_table: None,
        }
    }
}
