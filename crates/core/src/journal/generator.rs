//! Deterministic journal entry generation from discrepancies.

use monthend_shared::types::{JournalEntryId, Precision};
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use super::allocation::AllocationUtil;
use super::error::GenerationError;
use super::types::{
    EntryFailure, EntrySide, GenerationBatch, JournalEntry, JournalEntryLine, SkipReason,
    SkippedDiscrepancy,
};
use super::validation::validate_lines;
use crate::policy::{AccountMapping, DeltaDirection, MappingLines, MappingTable, SplitLine};
use crate::reconciliation::{DiscrepancyRecord, DiscrepancyRole, DiscrepancyStatus};

/// Answers the questions generation needs from the close state.
pub trait GenerationGate {
    /// Returns true if `record` has an approval for its current delta.
    fn is_approved(&self, record: &DiscrepancyRecord) -> bool;

    /// Returns true if `entry_id` was already posted.
    fn is_posted(&self, entry_id: JournalEntryId) -> bool;
}

enum Outcome {
    Entry(JournalEntry),
    Skipped(SkippedDiscrepancy),
    Failed(EntryFailure),
}

/// Turns authorized discrepancies into balanced journal entries.
///
/// Pure: the same records, mappings and gate always yield the same batch.
#[derive(Debug, Clone, Copy)]
pub struct JournalEntryGenerator<'a> {
    mappings: &'a MappingTable,
    precision: Precision,
}

impl<'a> JournalEntryGenerator<'a> {
    /// Creates a generator over `mappings`.
    #[must_use]
    pub const fn new(mappings: &'a MappingTable, precision: Precision) -> Self {
        Self {
            mappings,
            precision,
        }
    }

    /// Generates at most one entry per discrepancy.
    ///
    /// Cross-checks, unmatched records, zero deltas, unapproved records and
    /// already-posted entries are skipped with a reason. A missing mapping
    /// fails only that entry.
    ///
    /// # Errors
    ///
    /// Returns `UnbalancedJournalEntry` if any entry fails validation; no
    /// partial batch is returned.
    pub fn generate<G>(
        &self,
        records: &[DiscrepancyRecord],
        gate: &G,
    ) -> Result<GenerationBatch, GenerationError>
    where
        G: GenerationGate + Sync,
    {
        let outcomes: Vec<Outcome> = records
            .par_iter()
            .map(|record| self.decide(record, gate))
            .collect::<Result<_, _>>()?;

        let mut batch = GenerationBatch::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Entry(entry) => {
                    info!(
                        entry_id = %entry.id,
                        portfolio = %entry.portfolio,
                        metric = %entry.metric,
                        amount = %entry.totals().debit,
                        "Generated journal entry"
                    );
                    batch.entries.push(entry);
                }
                Outcome::Skipped(skipped) => {
                    debug!(
                        discrepancy_id = %skipped.discrepancy_id,
                        reason = %skipped.reason,
                        "Skipped discrepancy"
                    );
                    batch.skipped.push(skipped);
                }
                Outcome::Failed(failure) => {
                    error!(
                        discrepancy_id = %failure.discrepancy_id,
                        code = %failure.code,
                        "{}",
                        failure.message
                    );
                    batch.failures.push(failure);
                }
            }
        }
        Ok(batch)
    }

    fn decide<G: GenerationGate>(
        &self,
        record: &DiscrepancyRecord,
        gate: &G,
    ) -> Result<Outcome, GenerationError> {
        let skip = |reason| {
            Ok(Outcome::Skipped(SkippedDiscrepancy {
                discrepancy_id: record.id,
                portfolio: record.portfolio.clone(),
                metric: record.metric.clone(),
                reason,
            }))
        };

        if record.role == DiscrepancyRole::CrossCheck {
            return skip(SkipReason::CrossCheckOnly);
        }
        if record.status == DiscrepancyStatus::Unmatched {
            return skip(SkipReason::Unmatched);
        }
        let (Some(delta), Some(direction)) = (record.delta, record.direction()) else {
            return skip(SkipReason::ZeroDelta);
        };
        if record.requires_review() && !gate.is_approved(record) {
            return skip(SkipReason::NotApproved);
        }

        let entry_id = JournalEntry::derive_id(&record.period, &record.metric, &record.portfolio);
        if gate.is_posted(entry_id) {
            return skip(SkipReason::AlreadyPosted);
        }

        let Some(mapping) = self.mappings.lookup(&record.metric, direction) else {
            let error = GenerationError::UnmappedMetric {
                metric: record.metric.clone(),
                direction,
            };
            return Ok(Outcome::Failed(EntryFailure {
                discrepancy_id: record.id,
                portfolio: record.portfolio.clone(),
                metric: record.metric.clone(),
                code: error.error_code().to_string(),
                message: error.to_string(),
            }));
        };

        self.build(entry_id, record, delta, direction, mapping)
            .map(Outcome::Entry)
    }

    fn build(
        &self,
        entry_id: JournalEntryId,
        record: &DiscrepancyRecord,
        delta: Decimal,
        direction: DeltaDirection,
        mapping: &AccountMapping,
    ) -> Result<JournalEntry, GenerationError> {
        let amount = delta.abs();
        let memo = mapping.memo.clone().unwrap_or_else(|| {
            format!(
                "{} {} adjustment for portfolio {}",
                record.period, record.metric, record.portfolio
            )
        });
        let line_memo = format!("{} delta {}", record.metric, delta);

        let lines = match &mapping.lines {
            MappingLines::Simple { debit, credit } => vec![
                JournalEntryLine {
                    account: debit.clone(),
                    side: EntrySide::Debit,
                    amount,
                    memo: line_memo.clone(),
                },
                JournalEntryLine {
                    account: credit.clone(),
                    side: EntrySide::Credit,
                    amount,
                    memo: line_memo,
                },
            ],
            MappingLines::Split { lines } => self.split(amount, lines, &line_memo),
        };

        validate_lines(&lines)
            .map_err(|reason| GenerationError::UnbalancedJournalEntry { entry_id, reason })?;

        Ok(JournalEntry {
            id: entry_id,
            period: record.period,
            entry_date: record.period.period.end_date(),
            discrepancy_id: record.id,
            portfolio: record.portfolio.clone(),
            metric: record.metric.clone(),
            direction,
            memo,
            lines,
        })
    }

    /// Allocates `amount` across each side's lines by weight, keeping the
    /// configured line order and dropping lines allocated zero.
    fn split(&self, amount: Decimal, lines: &[SplitLine], memo: &str) -> Vec<JournalEntryLine> {
        let mut amounts = vec![Decimal::ZERO; lines.len()];
        for side in [EntrySide::Debit, EntrySide::Credit] {
            let indices: Vec<usize> = (0..lines.len()).filter(|i| lines[*i].side == side).collect();
            let weights: Vec<Decimal> = indices.iter().map(|i| lines[*i].weight).collect();
            let parts = AllocationUtil::allocate_by_weights(amount, &weights, self.precision);
            for (index, part) in indices.into_iter().zip(parts) {
                amounts[index] = part;
            }
        }

        lines
            .iter()
            .zip(amounts)
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .map(|(line, amount)| JournalEntryLine {
                account: line.account.clone(),
                side: line.side,
                amount,
                memo: memo.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::types::AccountRef;
    use crate::policy::AppliedTolerance;
    use crate::records::{MetricName, PortfolioId};
    use crate::reconciliation::SourceValue;
    use monthend_shared::types::{AccountingPeriod, DiscrepancyId, PeriodContext, SourceSystem};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Gate {
        approved: BTreeSet<DiscrepancyId>,
        posted: BTreeSet<JournalEntryId>,
    }

    impl GenerationGate for Gate {
        fn is_approved(&self, record: &DiscrepancyRecord) -> bool {
            self.approved.contains(&record.id)
        }

        fn is_posted(&self, entry_id: JournalEntryId) -> bool {
            self.posted.contains(&entry_id)
        }
    }

    fn context() -> PeriodContext {
        PeriodContext::initial(AccountingPeriod::new(2026, 1).unwrap())
    }

    fn record(portfolio: &str, metric: &str, auth: Decimal, cmp: Decimal, status: DiscrepancyStatus) -> DiscrepancyRecord {
        let portfolio = PortfolioId::from(portfolio);
        let metric = MetricName::from(metric);
        DiscrepancyRecord {
            id: DiscrepancyRecord::derive_id(&context(), &portfolio, &metric, SourceSystem::LedgerActuals),
            period: context(),
            portfolio,
            metric,
            role: DiscrepancyRole::Primary,
            authoritative: Some(SourceValue {
                source: SourceSystem::LoanServicingRegister,
                amount: auth,
            }),
            comparison: Some(SourceValue {
                source: SourceSystem::LedgerActuals,
                amount: cmp,
            }),
            delta: Some(auth - cmp),
            tolerance: Some(AppliedTolerance::ZERO),
            status,
            always_review: false,
        }
    }

    fn simple(metric: &str, direction: DeltaDirection, debit: &str, credit: &str) -> AccountMapping {
        AccountMapping {
            metric: MetricName::from(metric),
            direction,
            memo: None,
            lines: MappingLines::Simple {
                debit: AccountRef::new(debit, debit),
                credit: AccountRef::new(credit, credit),
            },
        }
    }

    fn mappings() -> MappingTable {
        MappingTable::new(vec![
            simple("charge_off_total", DeltaDirection::Positive, "Bad Debt Expense", "Allowance for Charge-offs"),
            simple("charge_off_total", DeltaDirection::Negative, "Allowance for Charge-offs", "Bad Debt Expense"),
        ])
    }

    #[test]
    fn test_scenario_a_entry() {
        let mappings = mappings();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![record("P1", "charge_off_total", dec!(125430.12), dec!(124900.00), DiscrepancyStatus::Matched)];

        let batch = generator.generate(&records, &Gate::default()).unwrap();

        assert_eq!(batch.entries.len(), 1);
        let entry = &batch.entries[0];
        assert_eq!(entry.lines[0].account.code, "Bad Debt Expense");
        assert_eq!(entry.lines[0].side, EntrySide::Debit);
        assert_eq!(entry.lines[0].amount, dec!(530.12));
        assert_eq!(entry.lines[1].account.code, "Allowance for Charge-offs");
        assert_eq!(entry.lines[1].side, EntrySide::Credit);
        assert_eq!(entry.lines[1].amount, dec!(530.12));
        assert_eq!(entry.entry_date, AccountingPeriod::new(2026, 1).unwrap().end_date());
        assert_eq!(
            entry.id,
            JournalEntry::derive_id(&context(), &MetricName::from("charge_off_total"), &PortfolioId::from("P1"))
        );
    }

    #[test]
    fn test_negative_delta_uses_reverse_mapping() {
        let mappings = mappings();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![record("P1", "charge_off_total", dec!(100), dec!(150), DiscrepancyStatus::Matched)];

        let batch = generator.generate(&records, &Gate::default()).unwrap();

        let entry = &batch.entries[0];
        assert_eq!(entry.direction, DeltaDirection::Negative);
        assert_eq!(entry.lines[0].account.code, "Allowance for Charge-offs");
        assert_eq!(entry.lines[0].amount, dec!(50));
    }

    #[test]
    fn test_flagged_requires_approval() {
        let mappings = mappings();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![record("P1", "charge_off_total", dec!(10000), dec!(0), DiscrepancyStatus::Flagged)];

        let batch = generator.generate(&records, &Gate::default()).unwrap();
        assert!(batch.entries.is_empty());
        assert_eq!(batch.skipped[0].reason, SkipReason::NotApproved);

        let gate = Gate {
            approved: [records[0].id].into_iter().collect(),
            ..Gate::default()
        };
        let batch = generator.generate(&records, &gate).unwrap();
        assert_eq!(batch.entries.len(), 1);
    }

    #[test]
    fn test_skip_reasons() {
        let mappings = mappings();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());

        let zero = record("P1", "charge_off_total", dec!(5), dec!(5), DiscrepancyStatus::Matched);
        let mut cross = record("P2", "charge_off_total", dec!(5), dec!(4), DiscrepancyStatus::Matched);
        cross.role = DiscrepancyRole::CrossCheck;
        let mut unmatched = record("P3", "charge_off_total", dec!(5), dec!(4), DiscrepancyStatus::Unmatched);
        unmatched.delta = None;
        unmatched.comparison = None;
        let posted = record("P4", "charge_off_total", dec!(5), dec!(4), DiscrepancyStatus::Matched);

        let gate = Gate {
            posted: [JournalEntry::derive_id(&context(), &posted.metric, &posted.portfolio)]
                .into_iter()
                .collect(),
            ..Gate::default()
        };
        let batch = generator
            .generate(&[zero, cross, unmatched, posted], &gate)
            .unwrap();

        let reasons: Vec<SkipReason> = batch.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::ZeroDelta,
                SkipReason::CrossCheckOnly,
                SkipReason::Unmatched,
                SkipReason::AlreadyPosted,
            ]
        );
        assert!(batch.entries.is_empty());
    }

    #[test]
    fn test_unmapped_metric_fails_only_that_entry() {
        let mappings = mappings();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![
            record("P1", "charge_off_total", dec!(10), dec!(5), DiscrepancyStatus::Matched),
            record("P1", "recoveries", dec!(10), dec!(5), DiscrepancyStatus::Matched),
        ];

        let batch = generator.generate(&records, &Gate::default()).unwrap();

        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].code, "UNMAPPED_METRIC");
        assert!(!batch.is_complete());
    }

    #[test]
    fn test_split_mapping_balances() {
        let mappings = MappingTable::new(vec![AccountMapping {
            metric: MetricName::from("allowance"),
            direction: DeltaDirection::Positive,
            memo: Some("Allowance true-up".to_string()),
            lines: MappingLines::Split {
                lines: vec![
                    SplitLine {
                        account: AccountRef::new("610500", "Bad Debt Writeoffs"),
                        side: EntrySide::Debit,
                        weight: dec!(2),
                    },
                    SplitLine {
                        account: AccountRef::new("610600", "Provision Expense"),
                        side: EntrySide::Debit,
                        weight: dec!(1),
                    },
                    SplitLine {
                        account: AccountRef::new("110002", "Allowance for Credit Losses"),
                        side: EntrySide::Credit,
                        weight: dec!(1),
                    },
                ],
            },
        }]);
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![record("P1", "allowance", dec!(100.00), dec!(0), DiscrepancyStatus::Matched)];

        let batch = generator.generate(&records, &Gate::default()).unwrap();

        let entry = &batch.entries[0];
        assert_eq!(entry.memo, "Allowance true-up");
        let amounts: Vec<Decimal> = entry.lines.iter().map(|l| l.amount).collect();
        assert_eq!(amounts, vec![dec!(66.67), dec!(33.33), dec!(100.00)]);
        assert!(entry.totals().is_balanced());
    }

    #[test]
    fn test_single_sided_mapping_aborts_batch() {
        let mappings = MappingTable::new(vec![AccountMapping {
            metric: MetricName::from("m"),
            direction: DeltaDirection::Positive,
            memo: None,
            lines: MappingLines::Split {
                lines: vec![SplitLine {
                    account: AccountRef::new("1", "Cash"),
                    side: EntrySide::Debit,
                    weight: dec!(1),
                }],
            },
        }]);
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let records = vec![
            record("P1", "charge_off_total", dec!(10), dec!(5), DiscrepancyStatus::Matched),
            record("P2", "m", dec!(10), dec!(5), DiscrepancyStatus::Matched),
        ];

        let err = generator.generate(&records, &Gate::default()).unwrap_err();
        assert_eq!(err.error_code(), "UNBALANCED_JOURNAL_ENTRY");
        assert!(err.is_batch_fatal());
    }
}
