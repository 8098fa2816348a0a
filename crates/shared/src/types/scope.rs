//! Organization/branch scoping supplied by the context provider.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{BranchId, OrganizationId};

/// Every engine entity belongs to exactly one organization and branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Owning branch.
    pub branch_id: BranchId,
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub const fn new(organization_id: OrganizationId, branch_id: BranchId) -> Self {
        Self {
            organization_id,
            branch_id,
        }
    }
}

/// Branch-level settings consumed by the computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSettings {
    /// Day-count convention for annual rates (usually 360 or 365).
    pub annual_divisor: u32,
    /// Default savings interest withholding tax, in percent.
    pub tax_interest: Decimal,
}

impl Default for BranchSettings {
    fn default() -> Self {
        Self {
            annual_divisor: 365,
            tax_interest: Decimal::from(20),
        }
    }
}
