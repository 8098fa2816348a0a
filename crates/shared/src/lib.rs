//! Shared types, errors, and configuration for Coopledger.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Money rounding helpers with fixed-point decimal precision
//! - Organization/branch scoping
//! - Application-wide error types and the error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{AppError, AppResult, ErrorCategory};
