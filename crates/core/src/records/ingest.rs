//! Normalization of adapter output into snapshots.

use monthend_shared::types::{AccountingPeriod, Precision};
use std::collections::btree_map::Entry;
use tracing::{debug, info};

use super::adapter::SourceAdapter;
use super::error::IngestionError;
use super::snapshot::{PortfolioSnapshot, SnapshotSet};
use super::types::CanonicalRecord;

/// Validates canonical records and groups them into snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ingestor {
    precision: Precision,
}

impl Ingestor {
    /// Creates an ingestor that accepts amounts at `precision`.
    #[must_use]
    pub const fn new(precision: Precision) -> Self {
        Self { precision }
    }

    /// Runs every adapter and builds the period's snapshot set.
    ///
    /// A source whose adapter returns no records simply has no snapshots;
    /// whether that is fatal is decided by reconciliation.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure. Nothing is partially ingested.
    pub fn ingest(
        &self,
        period: AccountingPeriod,
        adapters: &[&dyn SourceAdapter],
    ) -> Result<SnapshotSet, IngestionError> {
        let mut set = SnapshotSet::new();
        let mut grouped: std::collections::BTreeMap<_, PortfolioSnapshot> =
            std::collections::BTreeMap::new();

        for adapter in adapters {
            let source = adapter.source();
            let records = adapter.produce(period)?;
            debug!(source = %source, count = records.len(), "Adapter produced records");

            for record in records {
                let record = self.validate(period, source, record)?;
                let snapshot = grouped
                    .entry((record.portfolio.clone(), source))
                    .or_insert_with(|| {
                        PortfolioSnapshot::new(record.portfolio.clone(), source, period)
                    });
                match snapshot.values.entry(record.metric.clone()) {
                    Entry::Occupied(_) => {
                        return Err(IngestionError::DuplicateRecord {
                            portfolio: record.portfolio,
                            metric: record.metric,
                            system: source,
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(record.amount);
                    }
                }
            }
        }

        for snapshot in grouped.into_values() {
            set.insert(snapshot);
        }

        info!(
            period = %period,
            snapshots = set.len(),
            sources = set.sources().len(),
            "Ingested source snapshots"
        );
        Ok(set)
    }

    fn validate(
        &self,
        period: AccountingPeriod,
        source: monthend_shared::types::SourceSystem,
        mut record: CanonicalRecord,
    ) -> Result<CanonicalRecord, IngestionError> {
        if record.source != source {
            return Err(IngestionError::SourceMismatch {
                expected: source,
                found: record.source,
            });
        }
        if record.portfolio.is_empty() {
            return Err(IngestionError::EmptyIdentifier {
                system: source,
                field: "portfolio",
            });
        }
        if record.metric.is_empty() {
            return Err(IngestionError::EmptyIdentifier {
                system: source,
                field: "metric",
            });
        }
        if record.period != period {
            return Err(IngestionError::PeriodMismatch {
                portfolio: record.portfolio,
                metric: record.metric,
                expected: period,
                found: record.period,
            });
        }
        record.amount = self.precision.normalize(record.amount).map_err(|e| {
            IngestionError::PrecisionExceeded {
                portfolio: record.portfolio.clone(),
                metric: record.metric.clone(),
                system: source,
                amount: e.amount,
                digits: e.digits,
            }
        })?;
        Ok(record)
    }
}
