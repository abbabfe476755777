//! Property-based tests for the reconciliation engine.

use monthend_shared::types::{AccountingPeriod, PeriodContext, Precision, SourceSystem};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::policy::{ClosePolicy, ToleranceRule, ToleranceTable};
use crate::reconciliation::engine::ReconciliationEngine;
use crate::reconciliation::types::{DiscrepancyRole, DiscrepancyStatus};
use crate::records::{MetricName, PortfolioId, PortfolioSnapshot, SnapshotSet};

const REQUIRED: [SourceSystem; 1] = [SourceSystem::LedgerActuals];

fn period() -> AccountingPeriod {
    AccountingPeriod::new(2026, 1).unwrap()
}

/// Strategy for amounts in cents between -10M and 10M.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a source.
fn arb_source() -> impl Strategy<Value = SourceSystem> {
    prop_oneof![
        Just(SourceSystem::LoanServicingRegister),
        Just(SourceSystem::FundingPartnerA),
        Just(SourceSystem::FundingPartnerB),
        Just(SourceSystem::LedgerActuals),
    ]
}

/// Strategy for raw (portfolio, metric, source, amount) facts.
fn arb_facts() -> impl Strategy<Value = Vec<(u8, u8, SourceSystem, Decimal)>> {
    prop::collection::vec((0u8..4, 0u8..3, arb_source(), arb_amount()), 1..40)
}

fn build_set(facts: &[(u8, u8, SourceSystem, Decimal)]) -> SnapshotSet {
    let mut snapshots: std::collections::BTreeMap<(PortfolioId, SourceSystem), PortfolioSnapshot> =
        std::collections::BTreeMap::new();
    for (portfolio, metric, source, amount) in facts {
        let portfolio = PortfolioId::new(format!("P{portfolio}"));
        snapshots
            .entry((portfolio.clone(), *source))
            .or_insert_with(|| PortfolioSnapshot::new(portfolio, *source, period()))
            .values
            .insert(MetricName::new(format!("m{metric}")), *amount);
    }
    // Always provide the required source so reconciliation proceeds.
    snapshots
        .entry((PortfolioId::from("P0"), SourceSystem::LedgerActuals))
        .or_insert_with(|| {
            PortfolioSnapshot::new(PortfolioId::from("P0"), SourceSystem::LedgerActuals, period())
        });

    let mut set = SnapshotSet::new();
    for snapshot in snapshots.into_values() {
        set.insert(snapshot);
    }
    set
}

fn policy(absolute: Decimal, relative: Decimal) -> ClosePolicy {
    ClosePolicy {
        tolerances: ToleranceTable::new(vec![ToleranceRule {
            portfolio: None,
            metric: None,
            absolute,
            relative,
        }]),
        ..ClosePolicy::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Identical inputs produce byte-identical reports.
    #[test]
    fn prop_reconcile_is_deterministic(facts in arb_facts(), absolute in 0i64..100_000) {
        let set = build_set(&facts);
        let policy = policy(Decimal::new(absolute, 2), Decimal::new(5, 3));
        let engine = ReconciliationEngine::new(&policy, Precision::default(), &REQUIRED);
        let context = PeriodContext::initial(period());

        let first = serde_json::to_vec(&engine.reconcile(context, &set).unwrap()).unwrap();
        let second = serde_json::to_vec(&engine.reconcile(context, &set).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Every reported (portfolio, metric) surfaces in at least one record.
    #[test]
    fn prop_no_value_is_silently_dropped(facts in arb_facts()) {
        let set = build_set(&facts);
        let policy = policy(Decimal::ONE, Decimal::ZERO);
        let engine = ReconciliationEngine::new(&policy, Precision::default(), &REQUIRED);
        let report = engine.reconcile(PeriodContext::initial(period()), &set).unwrap();

        for snapshot in set.iter() {
            for metric in snapshot.values.keys() {
                prop_assert!(report
                    .records
                    .iter()
                    .any(|r| r.portfolio == snapshot.portfolio && &r.metric == metric));
            }
        }
    }

    /// Paired records carry delta = authoritative - comparison and a status
    /// consistent with their threshold.
    #[test]
    fn prop_status_follows_threshold(facts in arb_facts(), absolute in 0i64..100_000) {
        let set = build_set(&facts);
        let policy = policy(Decimal::new(absolute, 2), Decimal::new(1, 2));
        let engine = ReconciliationEngine::new(&policy, Precision::default(), &REQUIRED);
        let report = engine.reconcile(PeriodContext::initial(period()), &set).unwrap();

        for record in &report.records {
            match record.status {
                DiscrepancyStatus::Unmatched => {
                    prop_assert!(record.delta.is_none());
                    prop_assert!(record.authoritative.is_some() != record.comparison.is_some());
                }
                status => {
                    let auth = record.authoritative.unwrap().amount;
                    let cmp = record.comparison.unwrap().amount;
                    let delta = record.delta.unwrap();
                    let threshold = record.tolerance.unwrap().threshold;
                    prop_assert_eq!(delta, auth - cmp);
                    prop_assert_eq!(status == DiscrepancyStatus::Matched, delta.abs() <= threshold);
                }
            }
        }
    }

    /// Each paired (portfolio, metric) has exactly one primary record.
    #[test]
    fn prop_one_primary_per_pair(facts in arb_facts()) {
        let set = build_set(&facts);
        let policy = ClosePolicy::default();
        let engine = ReconciliationEngine::new(&policy, Precision::default(), &REQUIRED);
        let report = engine.reconcile(PeriodContext::initial(period()), &set).unwrap();

        let mut primaries = std::collections::BTreeMap::new();
        for record in report.records.iter().filter(|r| r.status != DiscrepancyStatus::Unmatched) {
            if record.role == DiscrepancyRole::Primary {
                *primaries.entry((&record.portfolio, &record.metric)).or_insert(0) += 1;
            }
        }
        prop_assert!(primaries.values().all(|count| *count == 1));
    }

    /// The threshold boundary is inclusive at any absolute tolerance.
    #[test]
    fn prop_boundary_inclusive(base in arb_amount(), cents in 0i64..1_000_000) {
        let tolerance = Decimal::new(cents, 2);
        let policy = policy(tolerance, Decimal::ZERO);
        let engine = ReconciliationEngine::new(&policy, Precision::default(), &REQUIRED);
        let unit = Precision::default().unit();

        for (offset, expected) in [(tolerance, DiscrepancyStatus::Matched), (tolerance + unit, DiscrepancyStatus::Flagged)] {
            let facts = vec![
                (1u8, 0u8, SourceSystem::LedgerActuals, base + offset),
                (1u8, 0u8, SourceSystem::LoanServicingRegister, base),
            ];
            let set = build_set(&facts);
            let report = engine.reconcile(PeriodContext::initial(period()), &set).unwrap();
            let record = report
                .records
                .iter()
                .find(|r| r.portfolio.as_str() == "P1")
                .unwrap();
            prop_assert_eq!(record.status, expected);
        }
    }
}
