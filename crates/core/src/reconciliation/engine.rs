//! Reconciliation engine: compares snapshots across sources under tolerance.

use monthend_shared::types::{PeriodContext, Precision, SourceSystem};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::error::ReconciliationError;
use super::rollforward::{self, RollForwardResult};
use super::types::{
    DiscrepancyRecord, DiscrepancyRole, DiscrepancyStatus, ReconciliationReport, SourceValue,
};
use crate::policy::ClosePolicy;
use crate::records::{MetricName, PortfolioId, PortfolioSnapshot, SnapshotSet};

/// Stateless reconciliation over a period's snapshots.
///
/// Portfolios are reconciled in parallel; output order is always
/// (portfolio, metric, role, comparison source).
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine<'a> {
    policy: &'a ClosePolicy,
    precision: Precision,
    required_sources: &'a [SourceSystem],
}

impl<'a> ReconciliationEngine<'a> {
    /// Creates an engine.
    ///
    /// # Arguments
    ///
    /// * `policy` - Tolerance and authority tables
    /// * `precision` - Precision used to truncate relative tolerances
    /// * `required_sources` - Sources that must have at least one snapshot
    #[must_use]
    pub const fn new(
        policy: &'a ClosePolicy,
        precision: Precision,
        required_sources: &'a [SourceSystem],
    ) -> Self {
        Self {
            policy,
            precision,
            required_sources,
        }
    }

    /// Reconciles every portfolio and metric in `snapshots`.
    ///
    /// # Errors
    ///
    /// Returns `MissingSourceData` if a required source has no snapshot at
    /// all. A source missing for only some portfolios yields unmatched
    /// records instead.
    pub fn reconcile(
        &self,
        context: PeriodContext,
        snapshots: &SnapshotSet,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let present = snapshots.sources();
        if let Some(missing) = self
            .required_sources
            .iter()
            .find(|source| !present.contains(source))
        {
            return Err(ReconciliationError::MissingSourceData {
                period: context.period,
                system: *missing,
            });
        }

        let portfolios: Vec<(&PortfolioId, &BTreeMap<SourceSystem, PortfolioSnapshot>)> = snapshots
            .portfolios()
            .filter_map(|p| snapshots.for_portfolio(p).map(|by_source| (p, by_source)))
            .collect();

        let per_portfolio: Vec<Vec<DiscrepancyRecord>> = portfolios
            .par_iter()
            .map(|(portfolio, by_source)| self.reconcile_portfolio(context, portfolio, by_source))
            .collect();
        let records: Vec<DiscrepancyRecord> = per_portfolio.into_iter().flatten().collect();

        for record in &records {
            match record.status {
                DiscrepancyStatus::Flagged => warn!(
                    period = %context,
                    portfolio = %record.portfolio,
                    metric = %record.metric,
                    delta = ?record.delta,
                    threshold = ?record.tolerance.map(|t| t.threshold),
                    "Discrepancy exceeds tolerance"
                ),
                DiscrepancyStatus::Unmatched => warn!(
                    period = %context,
                    portfolio = %record.portfolio,
                    metric = %record.metric,
                    "Value reported by a single source"
                ),
                DiscrepancyStatus::Matched => {}
            }
        }

        let roll_forwards = self.roll_forwards(snapshots);

        let report = ReconciliationReport {
            period: context,
            records,
            roll_forwards,
        };
        info!(
            period = %context,
            matched = report.count(DiscrepancyStatus::Matched),
            flagged = report.count(DiscrepancyStatus::Flagged),
            unmatched = report.count(DiscrepancyStatus::Unmatched),
            "Reconciliation complete"
        );
        Ok(report)
    }

    fn reconcile_portfolio(
        &self,
        context: PeriodContext,
        portfolio: &PortfolioId,
        by_source: &BTreeMap<SourceSystem, PortfolioSnapshot>,
    ) -> Vec<DiscrepancyRecord> {
        let mut metrics: BTreeMap<&MetricName, BTreeMap<SourceSystem, Decimal>> = BTreeMap::new();
        for (source, snapshot) in by_source {
            for (metric, amount) in &snapshot.values {
                metrics.entry(metric).or_default().insert(*source, *amount);
            }
        }

        let mut records = Vec::new();
        for (metric, values) in metrics {
            let present: BTreeSet<SourceSystem> = values.keys().copied().collect();
            let Some(pairing) = self.policy.authority.resolve(metric, &present) else {
                records.extend(
                    values
                        .iter()
                        .map(|(source, amount)| self.unmatched(context, portfolio, metric, *source, *amount)),
                );
                continue;
            };

            let value = |source: SourceSystem| SourceValue {
                source,
                amount: values.get(&source).copied().unwrap_or(Decimal::ZERO),
            };
            let authoritative = value(pairing.authoritative);

            records.push(self.compare(
                context,
                portfolio,
                metric,
                DiscrepancyRole::Primary,
                authoritative,
                value(pairing.primary),
            ));
            for source in pairing.cross_checks {
                records.push(self.compare(
                    context,
                    portfolio,
                    metric,
                    DiscrepancyRole::CrossCheck,
                    authoritative,
                    value(source),
                ));
            }
        }
        records
    }

    fn compare(
        &self,
        context: PeriodContext,
        portfolio: &PortfolioId,
        metric: &MetricName,
        role: DiscrepancyRole,
        authoritative: SourceValue,
        comparison: SourceValue,
    ) -> DiscrepancyRecord {
        let delta = authoritative.amount - comparison.amount;
        let tolerance =
            self.policy
                .tolerances
                .resolve(portfolio, metric, authoritative.amount, self.precision);
        let status = if tolerance.accepts(delta) {
            DiscrepancyStatus::Matched
        } else {
            DiscrepancyStatus::Flagged
        };

        DiscrepancyRecord {
            id: DiscrepancyRecord::derive_id(&context, portfolio, metric, comparison.source),
            period: context,
            portfolio: portfolio.clone(),
            metric: metric.clone(),
            role,
            authoritative: Some(authoritative),
            comparison: Some(comparison),
            delta: Some(delta),
            tolerance: Some(tolerance),
            status,
            always_review: self.policy.authority.always_review(metric),
        }
    }

    fn unmatched(
        &self,
        context: PeriodContext,
        portfolio: &PortfolioId,
        metric: &MetricName,
        source: SourceSystem,
        amount: Decimal,
    ) -> DiscrepancyRecord {
        let lone = Some(SourceValue { source, amount });
        let is_authoritative = source == self.policy.authority.preferred_authoritative(metric);
        DiscrepancyRecord {
            id: DiscrepancyRecord::derive_id(&context, portfolio, metric, source),
            period: context,
            portfolio: portfolio.clone(),
            metric: metric.clone(),
            role: DiscrepancyRole::Primary,
            authoritative: if is_authoritative { lone } else { None },
            comparison: if is_authoritative { None } else { lone },
            delta: None,
            tolerance: None,
            status: DiscrepancyStatus::Unmatched,
            always_review: self.policy.authority.always_review(metric),
        }
    }

    fn roll_forwards(&self, snapshots: &SnapshotSet) -> Vec<RollForwardResult> {
        let mut results = Vec::new();
        for rule in &self.policy.roll_forwards {
            for snapshot in snapshots.iter().filter(|s| s.source == rule.source) {
                let result = rollforward::evaluate(rule, snapshot);
                if result.status != DiscrepancyStatus::Matched {
                    warn!(
                        rule = %rule.name,
                        portfolio = %result.portfolio,
                        status = %result.status,
                        difference = ?result.difference,
                        "Roll-forward does not tie out"
                    );
                }
                results.push(result);
            }
        }
        results
    }
}
