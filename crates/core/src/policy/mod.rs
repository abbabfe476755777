//! Close policy: tolerances, authority, account mapping and roll-forwards.
//!
//! Policy is configuration; nothing in this module is hardcoded per metric.

pub mod authority;
pub mod error;
pub mod mapping;
pub mod rollforward;
pub mod tolerance;

pub use authority::{AuthorityTable, MetricPolicy, Pairing};
pub use error::PolicyError;
pub use mapping::{AccountMapping, DeltaDirection, MappingLines, MappingTable, SplitLine};
pub use rollforward::RollForwardRule;
pub use tolerance::{AppliedTolerance, ToleranceRule, ToleranceTable};

use serde::{Deserialize, Serialize};

/// Every table that parameterizes a close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePolicy {
    /// Tolerance rules.
    #[serde(default)]
    pub tolerances: ToleranceTable,
    /// Authority rules.
    #[serde(default)]
    pub authority: AuthorityTable,
    /// Account mappings.
    #[serde(default)]
    pub mappings: MappingTable,
    /// Roll-forward checks.
    #[serde(default)]
    pub roll_forwards: Vec<RollForwardRule>,
}

impl ClosePolicy {
    /// Validates every table.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.tolerances.validate()?;
        self.authority.validate()?;
        self.mappings.validate()?;
        for rule in &self.roll_forwards {
            rule.validate()?;
        }
        Ok(())
    }
}
