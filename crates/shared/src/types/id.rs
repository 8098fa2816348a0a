//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `MemberId` where an `AccountId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user (cashier, teller, employee).");
typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(BranchId, "Unique identifier for a branch of an organization.");
typed_id!(MemberId, "Unique identifier for a member profile.");
typed_id!(MemberTypeId, "Unique identifier for a member type.");
typed_id!(AccountId, "Unique identifier for a chart of accounts entry.");
typed_id!(
    TransactionId,
    "Unique identifier for an atomic group of general ledger rows."
);
typed_id!(GeneralLedgerId, "Unique identifier for a general ledger row.");
typed_id!(LoanTransactionId, "Unique identifier for a loan transaction.");
typed_id!(
    TransactionBatchId,
    "Unique identifier for a cashier's transaction batch."
);
typed_id!(
    UnbalancedAccountId,
    "Unique identifier for an overage/shortage suspense configuration."
);
typed_id!(
    GeneratedSavingsInterestId,
    "Unique identifier for a savings interest generation run."
);
