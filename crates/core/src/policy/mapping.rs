//! Account mapping from (metric, delta direction) to journal lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::error::PolicyError;
use crate::journal::{AccountRef, EntrySide};
use crate::records::MetricName;

/// Sign of a discrepancy delta (authoritative minus comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaDirection {
    /// The authoritative value is higher.
    Positive,
    /// The authoritative value is lower.
    Negative,
}

impl DeltaDirection {
    /// Returns the direction of `delta`, or `None` for zero.
    #[must_use]
    pub fn of(delta: Decimal) -> Option<Self> {
        if delta > Decimal::ZERO {
            Some(Self::Positive)
        } else if delta < Decimal::ZERO {
            Some(Self::Negative)
        } else {
            None
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for DeltaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One weighted line of a split mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLine {
    /// Account to post to.
    pub account: AccountRef,
    /// Debit or credit.
    pub side: EntrySide,
    /// Share of the side's amount, relative to the other lines on that side.
    pub weight: Decimal,
}

/// Lines produced by a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingLines {
    /// One debit and one credit for the full amount.
    Simple {
        /// Account debited.
        debit: AccountRef,
        /// Account credited.
        credit: AccountRef,
    },
    /// Several lines per side, each side allocated by weight.
    Split {
        /// The weighted lines.
        lines: Vec<SplitLine>,
    },
}

/// Mapping for one (metric, direction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMapping {
    /// The metric.
    pub metric: MetricName,
    /// The delta direction this mapping handles.
    pub direction: DeltaDirection,
    /// Entry memo; a generated description is used when absent.
    #[serde(default)]
    pub memo: Option<String>,
    /// The lines to produce.
    #[serde(flatten)]
    pub lines: MappingLines,
}

impl AccountMapping {
    fn invalid(&self, reason: &str) -> PolicyError {
        PolicyError::InvalidMapping {
            metric: self.metric.to_string(),
            direction: self.direction.to_string(),
            reason: reason.to_string(),
        }
    }

    fn validate(&self) -> Result<(), PolicyError> {
        match &self.lines {
            MappingLines::Simple { debit, credit } => {
                if debit.code.trim().is_empty() || credit.code.trim().is_empty() {
                    return Err(self.invalid("account code is empty"));
                }
                if debit.code == credit.code {
                    return Err(self.invalid("debit and credit use the same account"));
                }
            }
            MappingLines::Split { lines } => {
                let has_side =
                    |side: EntrySide| lines.iter().any(|line| line.side == side);
                if !has_side(EntrySide::Debit) || !has_side(EntrySide::Credit) {
                    return Err(self.invalid("split needs at least one debit and one credit"));
                }
                if lines.iter().any(|line| line.weight <= Decimal::ZERO) {
                    return Err(self.invalid("split weights must be positive"));
                }
                if lines.iter().any(|line| line.account.code.trim().is_empty()) {
                    return Err(self.invalid("account code is empty"));
                }
            }
        }
        Ok(())
    }
}

/// All account mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    mappings: Vec<AccountMapping>,
}

impl MappingTable {
    /// Creates a table from mappings.
    #[must_use]
    pub fn new(mappings: Vec<AccountMapping>) -> Self {
        Self { mappings }
    }

    /// Returns the mapping for a metric and direction.
    #[must_use]
    pub fn lookup(&self, metric: &MetricName, direction: DeltaDirection) -> Option<&AccountMapping> {
        self.mappings
            .iter()
            .find(|m| &m.metric == metric && m.direction == direction)
    }

    /// Checks every mapping and rejects duplicated (metric, direction) pairs.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = BTreeSet::new();
        for mapping in &self.mappings {
            if !seen.insert((&mapping.metric, mapping.direction)) {
                return Err(mapping.invalid("duplicate mapping"));
            }
            mapping.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(code: &str) -> AccountRef {
        AccountRef::new(code, format!("Account {code}"))
    }

    fn simple(metric: &str, direction: DeltaDirection) -> AccountMapping {
        AccountMapping {
            metric: MetricName::from(metric),
            direction,
            memo: None,
            lines: MappingLines::Simple {
                debit: account("610500"),
                credit: account("110000"),
            },
        }
    }

    #[test]
    fn test_direction_of() {
        assert_eq!(DeltaDirection::of(dec!(0.01)), Some(DeltaDirection::Positive));
        assert_eq!(DeltaDirection::of(dec!(-3)), Some(DeltaDirection::Negative));
        assert_eq!(DeltaDirection::of(dec!(0.00)), None);
    }

    #[test]
    fn test_lookup_by_metric_and_direction() {
        let table = MappingTable::new(vec![
            simple("charge_off_total", DeltaDirection::Positive),
            simple("charge_off_total", DeltaDirection::Negative),
        ]);
        let metric = MetricName::from("charge_off_total");
        assert!(table.lookup(&metric, DeltaDirection::Negative).is_some());
        assert!(table
            .lookup(&MetricName::from("recoveries"), DeltaDirection::Positive)
            .is_none());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let table = MappingTable::new(vec![
            simple("m", DeltaDirection::Positive),
            simple("m", DeltaDirection::Positive),
        ]);
        assert_eq!(table.validate().unwrap_err().error_code(), "INVALID_MAPPING");
    }

    #[test]
    fn test_validate_rejects_single_sided_split() {
        let mapping = AccountMapping {
            metric: MetricName::from("m"),
            direction: DeltaDirection::Positive,
            memo: None,
            lines: MappingLines::Split {
                lines: vec![SplitLine {
                    account: account("1"),
                    side: EntrySide::Debit,
                    weight: dec!(1),
                }],
            },
        };
        assert!(MappingTable::new(vec![mapping]).validate().is_err());
    }

    #[test]
    fn test_mapping_deserializes_from_toml_shape() {
        let json = serde_json::json!({
            "metric": "unearned_revenue_balance",
            "direction": "negative",
            "kind": "simple",
            "debit": {"code": "110010", "name": "Unearned Interest"},
            "credit": {"code": "400000", "name": "Finance Income"}
        });
        let mapping: AccountMapping = serde_json::from_value(json).unwrap();
        assert_eq!(mapping.direction, DeltaDirection::Negative);
        assert!(matches!(mapping.lines, MappingLines::Simple { .. }));
    }
}
