//! Transaction batch domain types.
//!
//! A batch is a cashier's working session. Its lifecycle is:
//! - Open → Closing (close started)
//! - Closing → Open (variance posting failed)
//! - Closing → Closed (totals frozen, balance status assigned)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use coopledger_shared::types::{
    AccountId, MemberId, Scope, TransactionBatchId, UnbalancedAccountId, UserId,
};

use super::error::BatchError;
use super::reconcile::BatchTotals;
use crate::posting::LedgerSource;

/// Lifecycle state of a transaction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// Accepts cash counts, remittances and ledger-linked entries.
    Open,
    /// A close is in flight.
    Closing,
    /// Totals frozen; accepts nothing.
    Closed,
}

impl BatchState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closing" => Some(Self::Closing),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Permanent outcome of a batch close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBatchBalanceStatus {
    /// Cash handled equals the supposed remittance.
    #[serde(rename = "balanced")]
    Balanced,
    /// More cash handled than supposed.
    #[serde(rename = "balance overage")]
    Overage,
    /// Less cash handled than supposed.
    #[serde(rename = "balance shortage")]
    Shortage,
}

impl TransactionBatchBalanceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Overage => "balance overage",
            Self::Shortage => "balance shortage",
        }
    }
}

impl fmt::Display for TransactionBatchBalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bills or coins of one denomination counted at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashCount {
    /// Face value.
    pub denomination: Decimal,
    /// Pieces counted.
    pub quantity: i64,
}

impl CashCount {
    /// Value of the pieces.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.denomination * Decimal::from(self.quantity)
    }
}

/// Kind of a non-cash remittance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemittanceKind {
    /// Checks received and remitted.
    Check,
    /// Online transfers received.
    Online,
}

/// A check or online remittance recorded on the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remittance {
    /// Check or online.
    pub kind: RemittanceKind,
    /// Amount remitted.
    pub amount: Decimal,
    /// Check number or transfer reference.
    pub reference_number: Option<String>,
}

/// Per-(branch, currency) accounts that receive batch variances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbalancedAccount {
    /// Configuration ID.
    pub id: UnbalancedAccountId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Currency code.
    pub currency: String,
    /// Teller cash account the batch reconciles.
    pub cash_account: AccountId,
    /// Suspense account debited with shortages.
    pub account_for_shortage: AccountId,
    /// Suspense account credited with overages.
    pub account_for_overage: AccountId,
    /// Member profile charged with shortages.
    pub member_profile_for_shortage: Option<MemberId>,
    /// Member profile credited with overages.
    pub member_profile_for_overage: Option<MemberId>,
    /// Only active rows are used.
    pub active: bool,
}

impl UnbalancedAccount {
    /// An active configuration without member profiles.
    #[must_use]
    pub fn new(
        scope: Scope,
        currency: impl Into<String>,
        cash_account: AccountId,
        account_for_shortage: AccountId,
        account_for_overage: AccountId,
    ) -> Self {
        Self {
            id: UnbalancedAccountId::new(),
            scope,
            currency: currency.into(),
            cash_account,
            account_for_shortage,
            account_for_overage,
            member_profile_for_shortage: None,
            member_profile_for_overage: None,
            active: true,
        }
    }
}

/// Picks the single active configuration for a scope and currency.
///
/// # Errors
///
/// Returns `MissingUnbalancedAccount` when none is active and
/// `DuplicateUnbalancedAccount` when more than one is.
pub fn select_unbalanced_account<'a>(
    configured: &'a [UnbalancedAccount],
    scope: Scope,
    currency: &str,
) -> Result<&'a UnbalancedAccount, BatchError> {
    let mut active = configured
        .iter()
        .filter(|u| u.active && u.scope == scope && u.currency == currency);
    let first = active.next().ok_or_else(|| BatchError::MissingUnbalancedAccount {
        currency: currency.to_string(),
    })?;
    if active.next().is_some() {
        return Err(BatchError::DuplicateUnbalancedAccount {
            currency: currency.to_string(),
        });
    }
    Ok(first)
}

/// A cashier's transaction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBatch {
    /// Batch ID.
    pub id: TransactionBatchId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Cashier.
    pub employee_user_id: UserId,
    /// Currency code; selects the unbalanced account configuration.
    pub currency: String,
    /// Business date.
    pub batch_date: NaiveDate,
    state: BatchState,
    cash_counts: Vec<CashCount>,
    fundings: Vec<Decimal>,
    deposits_in_bank: Vec<Decimal>,
    remittances: Vec<Remittance>,
    totals: Option<BatchTotals>,
    balance_status: Option<TransactionBatchBalanceStatus>,
    closed_at: Option<DateTime<Utc>>,
}

impl TransactionBatch {
    /// Opens a new batch.
    #[must_use]
    pub fn open(
        scope: Scope,
        employee_user_id: UserId,
        currency: impl Into<String>,
        batch_date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionBatchId::new(),
            scope,
            employee_user_id,
            currency: currency.into(),
            batch_date,
            state: BatchState::Open,
            cash_counts: Vec::new(),
            fundings: Vec::new(),
            deposits_in_bank: Vec::new(),
            remittances: Vec::new(),
            totals: None,
            balance_status: None,
            closed_at: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Returns true while the batch accepts entries.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == BatchState::Open
    }

    /// Frozen totals, once closed.
    #[must_use]
    pub fn totals(&self) -> Option<&BatchTotals> {
        self.totals.as_ref()
    }

    /// Permanent balance status, once closed.
    #[must_use]
    pub fn balance_status(&self) -> Option<TransactionBatchBalanceStatus> {
        self.balance_status
    }

    /// Close timestamp.
    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns true if rows of `source` may be tagged with the batch.
    ///
    /// A closing batch only takes its own variance posting.
    #[must_use]
    pub fn accepts(&self, source: LedgerSource) -> bool {
        match self.state {
            BatchState::Open => true,
            BatchState::Closing => source == LedgerSource::BatchVariance,
            BatchState::Closed => false,
        }
    }

    /// Fails unless the batch is open.
    ///
    /// # Errors
    ///
    /// Returns `BatchClosed` for a closed batch and `NotOpen` while closing.
    pub fn ensure_open(&self) -> Result<(), BatchError> {
        match self.state {
            BatchState::Open => Ok(()),
            BatchState::Closed => Err(BatchError::BatchClosed(self.id)),
            BatchState::Closing => Err(BatchError::NotOpen {
                id: self.id,
                state: self.state,
            }),
        }
    }

    /// Records counted bills or coins.
    ///
    /// # Errors
    ///
    /// Returns a state error if the batch is not open, or `InvalidCashCount`.
    pub fn add_cash_count(&mut self, denomination: Decimal, quantity: i64) -> Result<(), BatchError> {
        self.ensure_open()?;
        if denomination <= Decimal::ZERO || quantity < 0 {
            return Err(BatchError::InvalidCashCount {
                denomination,
                quantity,
            });
        }
        self.cash_counts.push(CashCount {
            denomination,
            quantity,
        });
        Ok(())
    }

    /// Records a batch funding (beginning balance).
    ///
    /// # Errors
    ///
    /// Returns a state error if the batch is not open, or `InvalidAmount`.
    pub fn add_funding(&mut self, amount: Decimal) -> Result<(), BatchError> {
        self.ensure_open()?;
        positive("funding", amount)?;
        self.fundings.push(amount);
        Ok(())
    }

    /// Records cash deposited in the bank during the session.
    ///
    /// # Errors
    ///
    /// Returns a state error if the batch is not open, or `InvalidAmount`.
    pub fn add_deposit_in_bank(&mut self, amount: Decimal) -> Result<(), BatchError> {
        self.ensure_open()?;
        positive("deposit in bank", amount)?;
        self.deposits_in_bank.push(amount);
        Ok(())
    }

    /// Records a check or online remittance.
    ///
    /// # Errors
    ///
    /// Returns a state error if the batch is not open, or `InvalidAmount`.
    pub fn add_remittance(&mut self, remittance: Remittance) -> Result<(), BatchError> {
        self.ensure_open()?;
        positive("remittance", remittance.amount)?;
        self.remittances.push(remittance);
        Ok(())
    }

    /// Cash counts recorded so far.
    #[must_use]
    pub fn cash_counts(&self) -> &[CashCount] {
        &self.cash_counts
    }

    /// Σ denomination × quantity.
    #[must_use]
    pub fn cash_count_total(&self) -> Decimal {
        self.cash_counts.iter().map(CashCount::amount).sum()
    }

    /// Σ fundings.
    #[must_use]
    pub fn beginning_balance(&self) -> Decimal {
        self.fundings.iter().copied().sum()
    }

    /// Σ deposits in bank.
    #[must_use]
    pub fn deposit_in_bank(&self) -> Decimal {
        self.deposits_in_bank.iter().copied().sum()
    }

    /// Σ remittances of one kind.
    #[must_use]
    pub fn remittance_total(&self, kind: RemittanceKind) -> Decimal {
        self.remittances
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.amount)
            .sum()
    }

    /// Open → Closing.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosing` while another close is in flight and
    /// `BatchClosed` once closed.
    pub fn begin_close(&mut self) -> Result<(), BatchError> {
        match self.state {
            BatchState::Open => {
                self.state = BatchState::Closing;
                Ok(())
            }
            BatchState::Closing => Err(BatchError::AlreadyClosing(self.id)),
            BatchState::Closed => Err(BatchError::BatchClosed(self.id)),
        }
    }

    /// Closing → Open, after a failed close.
    pub fn abort_close(&mut self) {
        if self.state == BatchState::Closing {
            self.state = BatchState::Open;
        }
    }

    /// Closing → Closed with frozen totals.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` unless the batch is closing.
    pub fn finish_close(&mut self, totals: BatchTotals, now: DateTime<Utc>) -> Result<(), BatchError> {
        if self.state != BatchState::Closing {
            return Err(BatchError::NotOpen {
                id: self.id,
                state: self.state,
            });
        }
        self.balance_status = Some(totals.status());
        self.totals = Some(totals);
        self.closed_at = Some(now);
        self.state = BatchState::Closed;
        Ok(())
    }
}

fn positive(what: &'static str, amount: Decimal) -> Result<(), BatchError> {
    if amount <= Decimal::ZERO {
        return Err(BatchError::InvalidAmount { what, amount });
    }
    Ok(())
}
