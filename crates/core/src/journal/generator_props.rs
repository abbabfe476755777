//! Property-based tests for journal entry generation.

use monthend_shared::types::{
    AccountingPeriod, DiscrepancyId, JournalEntryId, PeriodContext, Precision, SourceSystem,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

use crate::journal::generator::{GenerationGate, JournalEntryGenerator};
use crate::journal::types::{AccountRef, EntrySide};
use crate::policy::{
    AccountMapping, AppliedTolerance, DeltaDirection, MappingLines, MappingTable, SplitLine,
};
use crate::reconciliation::{DiscrepancyRecord, DiscrepancyRole, DiscrepancyStatus, SourceValue};
use crate::records::{MetricName, PortfolioId};

struct ApproveAll {
    posted: BTreeSet<JournalEntryId>,
}

impl GenerationGate for ApproveAll {
    fn is_approved(&self, _record: &DiscrepancyRecord) -> bool {
        true
    }

    fn is_posted(&self, entry_id: JournalEntryId) -> bool {
        self.posted.contains(&entry_id)
    }
}

fn context() -> PeriodContext {
    PeriodContext::initial(AccountingPeriod::new(2026, 3).unwrap())
}

fn arb_record() -> impl Strategy<Value = DiscrepancyRecord> {
    (0u8..20, -100_000_000i64..100_000_000i64, prop::bool::ANY).prop_map(|(p, cents, flagged)| {
        let portfolio = PortfolioId::new(format!("P{p}"));
        let metric = MetricName::from("allowance");
        let delta = Decimal::new(cents, 2);
        DiscrepancyRecord {
            id: DiscrepancyRecord::derive_id(&context(), &portfolio, &metric, SourceSystem::LedgerActuals),
            period: context(),
            portfolio,
            metric,
            role: DiscrepancyRole::Primary,
            authoritative: Some(SourceValue {
                source: SourceSystem::LoanServicingRegister,
                amount: delta,
            }),
            comparison: Some(SourceValue {
                source: SourceSystem::LedgerActuals,
                amount: Decimal::ZERO,
            }),
            delta: Some(delta),
            tolerance: Some(AppliedTolerance::ZERO),
            status: if flagged {
                DiscrepancyStatus::Flagged
            } else {
                DiscrepancyStatus::Matched
            },
            always_review: false,
        }
    })
}

/// Distinct portfolios so every record maps to its own entry id.
fn arb_records() -> impl Strategy<Value = Vec<DiscrepancyRecord>> {
    prop::collection::vec(arb_record(), 0..20).prop_map(|records| {
        let mut seen = BTreeSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.portfolio.clone()))
            .collect()
    })
}

fn arb_weights() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1i64..1000).prop_map(|w| Decimal::new(w, 1)), 1..4)
}

fn split_mappings(debits: &[Decimal], credits: &[Decimal]) -> MappingTable {
    let mut lines = Vec::new();
    for (i, weight) in debits.iter().enumerate() {
        lines.push(SplitLine {
            account: AccountRef::new(format!("6{i}"), "Expense"),
            side: EntrySide::Debit,
            weight: *weight,
        });
    }
    for (i, weight) in credits.iter().enumerate() {
        lines.push(SplitLine {
            account: AccountRef::new(format!("1{i}"), "Allowance"),
            side: EntrySide::Credit,
            weight: *weight,
        });
    }
    let mapping = |direction| AccountMapping {
        metric: MetricName::from("allowance"),
        direction,
        memo: None,
        lines: MappingLines::Split {
            lines: lines.clone(),
        },
    };
    MappingTable::new(vec![
        mapping(DeltaDirection::Positive),
        mapping(DeltaDirection::Negative),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every generated entry balances and each side sums to |delta|.
    #[test]
    fn prop_entries_balance(
        records in arb_records(),
        debits in arb_weights(),
        credits in arb_weights(),
    ) {
        let mappings = split_mappings(&debits, &credits);
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let gate = ApproveAll { posted: BTreeSet::new() };

        let batch = generator.generate(&records, &gate).unwrap();

        for entry in &batch.entries {
            let totals = entry.totals();
            prop_assert!(totals.is_balanced());
            let record = records.iter().find(|r| r.id == entry.discrepancy_id).unwrap();
            prop_assert_eq!(totals.debit, record.delta.unwrap().abs());
        }
    }

    /// Regeneration from identical inputs yields identical entries.
    #[test]
    fn prop_generation_is_deterministic(records in arb_records(), debits in arb_weights()) {
        let mappings = split_mappings(&debits, &[Decimal::ONE]);
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let gate = ApproveAll { posted: BTreeSet::new() };

        let first = serde_json::to_vec(&generator.generate(&records, &gate).unwrap()).unwrap();
        let second = serde_json::to_vec(&generator.generate(&records, &gate).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Once an entry is posted, regenerating never produces it again.
    #[test]
    fn prop_posted_entries_are_not_regenerated(records in arb_records()) {
        let mappings = split_mappings(&[Decimal::ONE], &[Decimal::ONE]);
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());

        let first = generator
            .generate(&records, &ApproveAll { posted: BTreeSet::new() })
            .unwrap();
        let posted: BTreeSet<JournalEntryId> = first.entries.iter().map(|e| e.id).collect();
        let second = generator.generate(&records, &ApproveAll { posted }).unwrap();

        prop_assert!(second.entries.is_empty());
        prop_assert_eq!(
            second.skipped.iter().filter(|s| s.reason == crate::journal::SkipReason::AlreadyPosted).count(),
            first.entries.len()
        );
    }

    /// Every record yields exactly one entry, skip or failure.
    #[test]
    fn prop_every_record_is_accounted_for(records in arb_records()) {
        let mappings = MappingTable::default();
        let generator = JournalEntryGenerator::new(&mappings, Precision::default());
        let gate = ApproveAll { posted: BTreeSet::new() };

        let batch = generator.generate(&records, &gate).unwrap();

        let mut ids: Vec<DiscrepancyId> = batch.skipped.iter().map(|s| s.discrepancy_id).collect();
        ids.extend(batch.failures.iter().map(|f| f.discrepancy_id));
        ids.extend(batch.entries.iter().map(|e| e.discrepancy_id));
        prop_assert_eq!(ids.len(), records.len());
    }
}
