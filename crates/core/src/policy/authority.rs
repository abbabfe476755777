//! Which source is authoritative for each metric.

use monthend_shared::types::SourceSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::error::PolicyError;
use crate::records::MetricName;

/// Per-metric reconciliation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPolicy {
    /// The metric this policy governs.
    pub metric: MetricName,
    /// The authoritative source; falls back to the table default.
    #[serde(default)]
    pub authoritative: Option<SourceSystem>,
    /// The designated comparison source.
    #[serde(default)]
    pub comparison: Option<SourceSystem>,
    /// Judgment metric: every non-zero adjustment needs review.
    #[serde(default)]
    pub always_review: bool,
}

/// How the sources present for one (portfolio, metric) are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// The source whose value is taken as truth.
    pub authoritative: SourceSystem,
    /// The comparison that can drive a journal entry.
    pub primary: SourceSystem,
    /// Further sources compared for information only.
    pub cross_checks: Vec<SourceSystem>,
}

/// Authority rules for all metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityTable {
    /// Authoritative source for metrics without their own policy.
    #[serde(default = "default_authoritative")]
    pub default_authoritative: SourceSystem,
    /// Metric-specific policies.
    #[serde(default)]
    pub metrics: Vec<MetricPolicy>,
}

fn default_authoritative() -> SourceSystem {
    SourceSystem::LedgerActuals
}

impl Default for AuthorityTable {
    fn default() -> Self {
        Self {
            default_authoritative: default_authoritative(),
            metrics: Vec::new(),
        }
    }
}

impl AuthorityTable {
    /// Returns the policy for `metric`, if one is configured.
    #[must_use]
    pub fn policy_for(&self, metric: &MetricName) -> Option<&MetricPolicy> {
        self.metrics.iter().find(|p| &p.metric == metric)
    }

    /// Returns true if every adjustment to `metric` needs review.
    #[must_use]
    pub fn always_review(&self, metric: &MetricName) -> bool {
        self.policy_for(metric).is_some_and(|p| p.always_review)
    }

    /// Returns the source preferred as authoritative for `metric`.
    #[must_use]
    pub fn preferred_authoritative(&self, metric: &MetricName) -> SourceSystem {
        self.policy_for(metric)
            .and_then(|p| p.authoritative)
            .unwrap_or(self.default_authoritative)
    }

    /// Resolves how the `present` sources are compared for `metric`.
    ///
    /// The authoritative source is the configured one, else the table
    /// default, else ledger actuals, else the first present source. The
    /// primary comparison is the configured one, else ledger actuals, else
    /// the first remaining source. Returns `None` with fewer than two sources.
    #[must_use]
    pub fn resolve(&self, metric: &MetricName, present: &BTreeSet<SourceSystem>) -> Option<Pairing> {
        if present.len() < 2 {
            return None;
        }
        let policy = self.policy_for(metric);

        let authoritative = [
            policy.and_then(|p| p.authoritative),
            Some(self.default_authoritative),
            Some(SourceSystem::LedgerActuals),
        ]
        .into_iter()
        .flatten()
        .find(|s| present.contains(s))
        .or_else(|| present.first().copied())?;

        let primary = [
            policy.and_then(|p| p.comparison),
            Some(SourceSystem::LedgerActuals),
        ]
        .into_iter()
        .flatten()
        .find(|s| *s != authoritative && present.contains(s))
        .or_else(|| present.iter().copied().find(|s| *s != authoritative))?;

        let cross_checks = present
            .iter()
            .copied()
            .filter(|s| *s != authoritative && *s != primary)
            .collect();

        Some(Pairing {
            authoritative,
            primary,
            cross_checks,
        })
    }

    /// Checks for duplicated metrics and self-comparisons.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = BTreeSet::new();
        for policy in &self.metrics {
            if !seen.insert(&policy.metric) {
                return Err(PolicyError::DuplicateAuthority {
                    metric: policy.metric.to_string(),
                });
            }
            let authoritative = policy.authoritative.unwrap_or(self.default_authoritative);
            if policy.comparison == Some(authoritative) {
                return Err(PolicyError::SelfComparison {
                    metric: policy.metric.to_string(),
                });
            }
        }
        Ok(())
    }
}
