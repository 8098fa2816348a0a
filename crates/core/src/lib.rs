//! Core computation for Coopledger.
//!
//! This crate contains the pure financial computation of the engine with
//! ZERO storage or async dependencies. All policy types, validation rules
//! and calculations live here.
//!
//! # Modules
//!
//! - `rates` - Interest, fines and charge rate resolution
//! - `amortization` - Loan entry sets and repayment schedules
//! - `posting` - Balanced posting plans and running balances
//! - `batch` - Transaction batch state and reconciliation
//! - `savings` - Savings interest formulas and run generation

pub mod amortization;
pub mod batch;
pub mod posting;
pub mod rates;
pub mod savings;
