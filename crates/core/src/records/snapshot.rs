//! Per-portfolio, per-source snapshots assembled from canonical records.

use monthend_shared::types::{AccountingPeriod, SourceSystem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::{MetricName, PortfolioId};

/// Aggregate view of one portfolio from one source for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// The portfolio.
    pub portfolio: PortfolioId,
    /// The reporting source.
    pub source: SourceSystem,
    /// The accounting period.
    pub period: AccountingPeriod,
    /// Metric values keyed by metric name.
    pub values: BTreeMap<MetricName, Decimal>,
}

impl PortfolioSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(portfolio: PortfolioId, source: SourceSystem, period: AccountingPeriod) -> Self {
        Self {
            portfolio,
            source,
            period,
            values: BTreeMap::new(),
        }
    }

    /// Returns the value reported for `metric`, if any.
    #[must_use]
    pub fn get(&self, metric: &MetricName) -> Option<Decimal> {
        self.values.get(metric).copied()
    }
}

/// Every snapshot ingested for one period, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSet {
    snapshots: BTreeMap<PortfolioId, BTreeMap<SourceSystem, PortfolioSnapshot>>,
}

impl SnapshotSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a snapshot, replacing any previous one for the same
    /// portfolio and source.
    pub fn insert(&mut self, snapshot: PortfolioSnapshot) {
        self.snapshots
            .entry(snapshot.portfolio.clone())
            .or_default()
            .insert(snapshot.source, snapshot);
    }

    /// Returns the snapshot for a portfolio and source.
    #[must_use]
    pub fn get(&self, portfolio: &PortfolioId, source: SourceSystem) -> Option<&PortfolioSnapshot> {
        self.snapshots.get(portfolio)?.get(&source)
    }

    /// Returns all portfolios in sorted order.
    pub fn portfolios(&self) -> impl Iterator<Item = &PortfolioId> {
        self.snapshots.keys()
    }

    /// Returns the snapshots of one portfolio keyed by source.
    #[must_use]
    pub fn for_portfolio(
        &self,
        portfolio: &PortfolioId,
    ) -> Option<&BTreeMap<SourceSystem, PortfolioSnapshot>> {
        self.snapshots.get(portfolio)
    }

    /// Returns every source with at least one snapshot.
    #[must_use]
    pub fn sources(&self) -> BTreeSet<SourceSystem> {
        self.snapshots
            .values()
            .flat_map(|by_source| by_source.keys().copied())
            .collect()
    }

    /// Returns every snapshot in (portfolio, source) order.
    pub fn iter(&self) -> impl Iterator<Item = &PortfolioSnapshot> {
        self.snapshots.values().flat_map(BTreeMap::values)
    }

    /// Returns the number of snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing was ingested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
