//! Reconciliation output types.

use monthend_shared::types::{DiscrepancyId, PeriodContext, SourceSystem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::policy::{AppliedTolerance, DeltaDirection};
use crate::records::{MetricName, PortfolioId};

/// Classification of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    /// Delta within tolerance.
    Matched,
    /// Delta beyond tolerance; routes to review.
    Flagged,
    /// Only one source reported the value.
    Unmatched,
}

impl DiscrepancyStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Flagged => "flagged",
            Self::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which pairing a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyRole {
    /// Authoritative vs. designated comparison; the only role that posts.
    Primary,
    /// Authoritative vs. a further source.
    CrossCheck,
}

/// A value as reported by one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceValue {
    /// The reporting source.
    pub source: SourceSystem,
    /// The reported amount.
    pub amount: Decimal,
}

/// Result of comparing one metric of one portfolio across two sources.
///
/// Immutable once created; identical inputs produce byte-identical records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    /// Deterministic id over (period, portfolio, metric, comparison source).
    pub id: DiscrepancyId,
    /// Close version.
    pub period: PeriodContext,
    /// The portfolio.
    pub portfolio: PortfolioId,
    /// The metric.
    pub metric: MetricName,
    /// Pairing role.
    pub role: DiscrepancyRole,
    /// Authoritative value, absent for an unmatched comparison-side value.
    pub authoritative: Option<SourceValue>,
    /// Comparison value, absent for an unmatched authoritative-side value.
    pub comparison: Option<SourceValue>,
    /// Authoritative minus comparison.
    pub delta: Option<Decimal>,
    /// Tolerance applied to the delta.
    pub tolerance: Option<AppliedTolerance>,
    /// Classification.
    pub status: DiscrepancyStatus,
    /// Judgment metric that always needs review.
    pub always_review: bool,
}

impl DiscrepancyRecord {
    /// Derives the id for a comparison.
    #[must_use]
    pub fn derive_id(
        period: &PeriodContext,
        portfolio: &PortfolioId,
        metric: &MetricName,
        comparison: SourceSystem,
    ) -> DiscrepancyId {
        DiscrepancyId::derive(&format!("{}|{}|{}|{}", period.key(), portfolio, metric, comparison))
    }

    /// Returns the direction of the delta, `None` when zero or absent.
    #[must_use]
    pub fn direction(&self) -> Option<DeltaDirection> {
        self.delta.and_then(DeltaDirection::of)
    }

    /// Returns true if the delta is present and non-zero.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.direction().is_some()
    }

    /// Returns true if the record must be approved before the close proceeds.
    ///
    /// Flagged records always need review. Matched primary records of an
    /// always-review metric need review when they would produce an entry.
    #[must_use]
    pub fn requires_review(&self) -> bool {
        match self.status {
            DiscrepancyStatus::Flagged => true,
            DiscrepancyStatus::Matched => {
                self.always_review && self.role == DiscrepancyRole::Primary && self.has_delta()
            }
            DiscrepancyStatus::Unmatched => false,
        }
    }
}

/// Everything reconciliation produced for one close version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Close version.
    pub period: PeriodContext,
    /// Records sorted by (portfolio, metric, role, comparison source).
    pub records: Vec<DiscrepancyRecord>,
    /// Roll-forward results, informational only.
    pub roll_forwards: Vec<super::rollforward::RollForwardResult>,
}

impl ReconciliationReport {
    /// Returns the number of records with `status`.
    #[must_use]
    pub fn count(&self, status: DiscrepancyStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Returns the records that need review.
    pub fn needs_review(&self) -> impl Iterator<Item = &DiscrepancyRecord> {
        self.records.iter().filter(|r| r.requires_review())
    }

    /// Returns the record with `id`.
    #[must_use]
    pub fn find(&self, id: DiscrepancyId) -> Option<&DiscrepancyRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monthend_shared::types::AccountingPeriod;
    use rust_decimal_macros::dec;

    fn record(status: DiscrepancyStatus, role: DiscrepancyRole, delta: Decimal, always_review: bool) -> DiscrepancyRecord {
        let period = PeriodContext::initial(AccountingPeriod::new(2026, 1).unwrap());
        let portfolio = PortfolioId::from("P1");
        let metric = MetricName::from("m");
        DiscrepancyRecord {
            id: DiscrepancyRecord::derive_id(&period, &portfolio, &metric, SourceSystem::LedgerActuals),
            period,
            portfolio,
            metric,
            role,
            authoritative: None,
            comparison: None,
            delta: Some(delta),
            tolerance: None,
            status,
            always_review,
        }
    }

    #[test]
    fn test_requires_review() {
        use DiscrepancyRole::{CrossCheck, Primary};
        use DiscrepancyStatus::{Flagged, Matched, Unmatched};

        assert!(record(Flagged, Primary, dec!(10), false).requires_review());
        assert!(record(Flagged, CrossCheck, dec!(10), false).requires_review());
        assert!(!record(Matched, Primary, dec!(10), false).requires_review());
        assert!(record(Matched, Primary, dec!(10), true).requires_review());
        assert!(!record(Matched, Primary, dec!(0), true).requires_review());
        assert!(!record(Matched, CrossCheck, dec!(10), true).requires_review());
        assert!(!record(Unmatched, Primary, dec!(10), true).requires_review());
    }

    #[test]
    fn test_direction() {
        let r = record(DiscrepancyStatus::Matched, DiscrepancyRole::Primary, dec!(-1), false);
        assert_eq!(r.direction(), Some(DeltaDirection::Negative));
        let r = record(DiscrepancyStatus::Matched, DiscrepancyRole::Primary, dec!(0.00), false);
        assert!(!r.has_delta());
    }

    #[test]
    fn test_id_depends_on_comparison_source() {
        let period = PeriodContext::initial(AccountingPeriod::new(2026, 1).unwrap());
        let portfolio = PortfolioId::from("P1");
        let metric = MetricName::from("m");
        assert_ne!(
            DiscrepancyRecord::derive_id(&period, &portfolio, &metric, SourceSystem::LedgerActuals),
            DiscrepancyRecord::derive_id(&period, &portfolio, &metric, SourceSystem::FundingPartnerA)
        );
    }
}
