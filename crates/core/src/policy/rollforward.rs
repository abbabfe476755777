//! Roll-forward rules: beginning balance plus activity must equal the
//! reported ending balance.

use monthend_shared::types::SourceSystem;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PolicyError;
use crate::records::MetricName;

/// A balance roll-forward checked within one source's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollForwardRule {
    /// Rule name, e.g. `allowance_for_credit_losses`.
    pub name: String,
    /// Source whose snapshots are checked.
    pub source: SourceSystem,
    /// Beginning balance metric; zero when unset or absent from the snapshot.
    #[serde(default)]
    pub beginning: Option<MetricName>,
    /// Metrics added to the beginning balance.
    #[serde(default)]
    pub additions: Vec<MetricName>,
    /// Metrics subtracted from the beginning balance.
    #[serde(default)]
    pub subtractions: Vec<MetricName>,
    /// Reported ending balance metric.
    pub ending: MetricName,
    /// Allowed absolute difference.
    #[serde(default)]
    pub tolerance: Decimal,
}

impl RollForwardRule {
    /// Checks the rule for an empty name or negative tolerance.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::InvalidRollForward` when malformed.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::InvalidRollForward {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if self.tolerance < Decimal::ZERO {
            return Err(PolicyError::InvalidRollForward {
                name: self.name.clone(),
                reason: "tolerance is negative".to_string(),
            });
        }
        if self.beginning.as_ref() == Some(&self.ending) {
            return Err(PolicyError::InvalidRollForward {
                name: self.name.clone(),
                reason: "beginning and ending are the same metric".to_string(),
            });
        }
        Ok(())
    }
}
