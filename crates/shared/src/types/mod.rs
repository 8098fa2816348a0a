//! Common types used across the engine.

pub mod id;
pub mod money;
pub mod scope;


pub use id::*;
pub use money::{MONEY_SCALE, percent_of, round_money};
pub use scope::{BranchSettings, Scope};
