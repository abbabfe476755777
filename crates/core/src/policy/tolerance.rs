//! Tolerance rules and threshold computation.

use monthend_shared::types::Precision;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::error::PolicyError;
use crate::records::{MetricName, PortfolioId};

/// One tolerance rule.
///
/// A rule with both `portfolio` and `metric` set is the most specific; a
/// rule with neither is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceRule {
    /// Portfolio the rule is limited to.
    #[serde(default)]
    pub portfolio: Option<PortfolioId>,
    /// Metric the rule is limited to.
    #[serde(default)]
    pub metric: Option<MetricName>,
    /// Absolute threshold in currency units.
    #[serde(default)]
    pub absolute: Decimal,
    /// Relative threshold as a fraction of the authoritative value.
    #[serde(default)]
    pub relative: Decimal,
}

impl ToleranceRule {
    /// Returns how specific the rule's scope is; higher wins.
    ///
    /// Portfolio+metric (3) > metric (2) > portfolio (1) > default (0).
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (&self.portfolio, &self.metric) {
            (Some(_), Some(_)) => 3,
            (None, Some(_)) => 2,
            (Some(_), None) => 1,
            (None, None) => 0,
        }
    }

    /// Returns true if the rule applies to the given portfolio and metric.
    #[must_use]
    pub fn applies_to(&self, portfolio: &PortfolioId, metric: &MetricName) -> bool {
        self.portfolio.as_ref().is_none_or(|p| p == portfolio)
            && self.metric.as_ref().is_none_or(|m| m == metric)
    }

    /// Computes the threshold for an authoritative value.
    ///
    /// The threshold is the larger of the absolute and relative parts; the
    /// relative part is truncated toward zero at `precision`.
    #[must_use]
    pub fn threshold_for(&self, authoritative: Decimal, precision: Precision) -> AppliedTolerance {
        let relative_part = precision.truncate(self.relative * authoritative.abs());
        let absolute = precision.truncate(self.absolute);
        AppliedTolerance {
            absolute: self.absolute,
            relative: self.relative,
            threshold: absolute.max(relative_part),
        }
    }

    fn scope(&self) -> String {
        match (&self.portfolio, &self.metric) {
            (Some(p), Some(m)) => format!("portfolio {p} metric {m}"),
            (None, Some(m)) => format!("metric {m}"),
            (Some(p), None) => format!("portfolio {p}"),
            (None, None) => "default".to_string(),
        }
    }
}

/// The tolerance actually applied to a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTolerance {
    /// Configured absolute threshold.
    pub absolute: Decimal,
    /// Configured relative threshold.
    pub relative: Decimal,
    /// Effective threshold the delta was compared against.
    pub threshold: Decimal,
}

impl AppliedTolerance {
    /// Zero tolerance, used when no rule matches.
    pub const ZERO: Self = Self {
        absolute: Decimal::ZERO,
        relative: Decimal::ZERO,
        threshold: Decimal::ZERO,
    };

    /// Returns true if `delta` is within the threshold (inclusive).
    #[must_use]
    pub fn accepts(&self, delta: Decimal) -> bool {
        delta.abs() <= self.threshold
    }
}

impl fmt::Display for AppliedTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "threshold {} (absolute {}, relative {})",
            self.threshold, self.absolute, self.relative
        )
    }
}

/// Ordered collection of tolerance rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceTable {
    rules: Vec<ToleranceRule>,
}

impl ToleranceTable {
    /// Creates a table from rules.
    #[must_use]
    pub fn new(rules: Vec<ToleranceRule>) -> Self {
        Self { rules }
    }

    /// Returns the most specific rule for a portfolio and metric.
    #[must_use]
    pub fn lookup(&self, portfolio: &PortfolioId, metric: &MetricName) -> Option<&ToleranceRule> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(portfolio, metric))
            .max_by_key(|rule| rule.specificity())
    }

    /// Resolves the applied tolerance; zero when no rule matches.
    #[must_use]
    pub fn resolve(
        &self,
        portfolio: &PortfolioId,
        metric: &MetricName,
        authoritative: Decimal,
        precision: Precision,
    ) -> AppliedTolerance {
        self.lookup(portfolio, metric)
            .map_or(AppliedTolerance::ZERO, |rule| {
                rule.threshold_for(authoritative, precision)
            })
    }

    /// Checks for negative thresholds and duplicated scopes.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            if rule.absolute < Decimal::ZERO || rule.relative < Decimal::ZERO {
                return Err(PolicyError::NegativeTolerance { scope: rule.scope() });
            }
            if !seen.insert((rule.portfolio.clone(), rule.metric.clone())) {
                return Err(PolicyError::DuplicateTolerance { scope: rule.scope() });
            }
        }
        Ok(())
    }
}
