//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `RunId` where a
//! `JournalEntryId` is expected. Two flavours exist:
//!
//! - run-scoped ids (`RunId`, `ApproverId`) are random, time-ordered UUID v7;
//! - derived ids (`DiscrepancyId`, `JournalEntryId`) are UUID v5 over a logical
//!   key, so the same key always yields the same id across reruns.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates the parts shared by both id flavours.
macro_rules! id_common {
    ($name:ident) => {
        impl $name {
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

/// Macro to generate random typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        id_common!($name);
    };
}

/// Macro to generate deterministic typed ID wrappers.
macro_rules! derived_id {
    ($name:ident, $namespace:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Derives the ID from its logical key using UUID v5.
            ///
            /// The same key always produces the same ID.
            #[must_use]
            pub fn derive(key: &str) -> Self {
                Self(Uuid::new_v5(&$namespace, key.as_bytes()))
            }
        }

        id_common!($name);
    };
}

/// Namespace for discrepancy ids.
pub const DISCREPANCY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d0e_8a43_4b57_9e21_4c6a_1f0d_7b31);

/// Namespace for journal entry ids.
pub const JOURNAL_ENTRY_NAMESPACE: Uuid = Uuid::from_u128(0x2b9e_54a7_c318_4d6f_a0b2_93e5_7c41_d806);

typed_id!(RunId, "Unique identifier for one close run of a period.");
typed_id!(ApproverId, "Unique identifier for a reviewer who approves discrepancies.");

derived_id!(
    DiscrepancyId,
    DISCREPANCY_NAMESPACE,
    "Deterministic identifier for a discrepancy, derived from period, portfolio, metric and comparison source."
);
derived_id!(
    JournalEntryId,
    JOURNAL_ENTRY_NAMESPACE,
    "Deterministic identifier for a journal entry, derived from period, metric and portfolio."
);

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
