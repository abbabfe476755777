use super::*;
use crate::policy::AppliedTolerance;
use crate::reconciliation::{DiscrepancyRole, DiscrepancyStatus, SourceValue};
use crate::records::{MetricName, PortfolioId};
use chrono::TimeZone;
use monthend_shared::types::{AccountingPeriod, SourceSystem};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn context() -> PeriodContext {
    PeriodContext::initial(AccountingPeriod::new(2026, 1).unwrap())
}

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap()
}

fn record(portfolio: &str, delta: Decimal, status: DiscrepancyStatus) -> DiscrepancyRecord {
    let portfolio = PortfolioId::from(portfolio);
    let metric = MetricName::from("unearned_revenue_balance");
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
        status,
        always_review: false,
    }
}

fn report(records: Vec<DiscrepancyRecord>) -> ReconciliationReport {
    ReconciliationReport {
        period: context(),
        records,
        roll_forwards: Vec::new(),
    }
}

/// Drives a fresh close to the point after reconciliation.
fn reconciled(records: Vec<DiscrepancyRecord>) -> (PeriodClose, RunId, CloseStatus) {
    let mut close = PeriodClose::new(context());
    let run = RunId::new();
    close.begin_run(run).unwrap();
    close.snapshots_ingested(run).unwrap();
    let next = close.reconciled(run, report(records)).unwrap();
    (close, run, next)
}

#[test]
fn test_happy_path_to_closed() {
    let (mut close, run, next) = reconciled(vec![record("P1", dec!(5), DiscrepancyStatus::Matched)]);
    assert_eq!(next, CloseStatus::Generating);

    let entry_id = JournalEntryId::derive("entry");
    close.batch_generated(run, &GenerationBatch::default()).unwrap();
    close.record_posting(run, entry_id).unwrap();
    close.mark_posted(run).unwrap();
    close.close(run).unwrap();

    assert_eq!(close.status(), CloseStatus::Closed);
    assert_eq!(close.exit_status(), Some(ExitStatus::Closed));
    assert!(close.active_run().is_none());
    assert!(close.posted().contains(&entry_id));
    let path: Vec<CloseStatus> = close.history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            CloseStatus::Parsing,
            CloseStatus::Reconciling,
            CloseStatus::Generating,
            CloseStatus::Posted,
            CloseStatus::Closed,
        ]
    );
}

#[test]
fn test_flagged_routes_to_review() {
    let flagged = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let (close, _, next) = reconciled(vec![flagged.clone()]);

    assert_eq!(next, CloseStatus::AwaitingReview);
    assert!(close.pending_review().contains(&flagged.id));
    assert_eq!(close.exit_status(), Some(ExitStatus::NeedsAttention));
}

#[test]
fn test_approval_transitions_to_generating() {
    let a = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let b = record("P2", dec!(-2000), DiscrepancyStatus::Flagged);
    let (mut close, run, _) = reconciled(vec![a.clone(), b.clone()]);
    close.end_run(run);
    let approver = ApproverId::new();

    let first = close.approve(a.id, approver, at());
    assert_eq!(
        first,
        ReviewOutcome::Accepted {
            remaining: 1,
            transitioned: false
        }
    );
    assert_eq!(close.status(), CloseStatus::AwaitingReview);

    let second = close.approve(b.id, approver, at());
    assert_eq!(
        second,
        ReviewOutcome::Accepted {
            remaining: 0,
            transitioned: true
        }
    );
    assert_eq!(close.status(), CloseStatus::Generating);
    assert_eq!(close.approvals().len(), 2);
    assert_eq!(close.approvals()[0].approved_delta, Some(dec!(10000)));
    assert_eq!(close.approvals()[0].approved_at, at());
    assert!(close.is_approved(&a));
    assert_eq!(
        close.history().last().and_then(|t| t.note.clone()),
        Some("reviewed".to_string())
    );
}

#[test]
fn test_approval_rejections() {
    let flagged = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let matched = record("P2", dec!(1), DiscrepancyStatus::Matched);
    let (mut close, _, _) = reconciled(vec![flagged.clone(), matched.clone()]);
    let approver = ApproverId::new();

    assert_eq!(
        close.approve(DiscrepancyId::derive("nope"), approver, at()),
        ReviewOutcome::Rejected {
            rejection: ReviewRejection::UnknownDiscrepancy
        }
    );
    assert_eq!(
        close.approve(matched.id, approver, at()),
        ReviewOutcome::Rejected {
            rejection: ReviewRejection::NotPendingReview
        }
    );
    assert!(close.approve(flagged.id, approver, at()).is_accepted());
    assert_eq!(
        close.approve(flagged.id, approver, at()),
        ReviewOutcome::Rejected {
            rejection: ReviewRejection::NotAwaitingReview {
                status: CloseStatus::Generating
            }
        }
    );
}

#[test]
fn test_approval_binds_to_delta() {
    let flagged = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let (mut close, run, _) = reconciled(vec![flagged.clone()]);
    close.end_run(run);
    assert!(close.approve(flagged.id, ApproverId::new(), at()).is_accepted());

    // A later delta for the same discrepancy is not covered.
    let changed = record("P1", dec!(12000), DiscrepancyStatus::Flagged);
    assert_eq!(changed.id, flagged.id);
    assert!(close.is_approved(&flagged));
    assert!(!close.is_approved(&changed));

    close.fail(FailureKind::PostingTransient, "ledger timeout").unwrap();
    close.restart().unwrap();
    let rerun = RunId::new();
    close.begin_run(rerun).unwrap();
    close.snapshots_ingested(rerun).unwrap();
    assert_eq!(
        close.reconciled(rerun, report(vec![changed])).unwrap(),
        CloseStatus::AwaitingReview
    );

    // The original delta stays approved across the restart.
    close.fail(FailureKind::InvalidInput, "bad file").unwrap();
    close.restart().unwrap();
    close.begin_run(rerun).unwrap();
    close.snapshots_ingested(rerun).unwrap();
    assert_eq!(
        close.reconciled(rerun, report(vec![flagged])).unwrap(),
        CloseStatus::Generating
    );
}

#[test]
fn test_always_review_matched_needs_approval() {
    let mut judgment = record("P1", dec!(12.50), DiscrepancyStatus::Matched);
    judgment.always_review = true;
    let (_, _, next) = reconciled(vec![judgment]);
    assert_eq!(next, CloseStatus::AwaitingReview);
}

#[test]
fn test_decline_fails_close() {
    let flagged = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let (mut close, _, _) = reconciled(vec![flagged.clone()]);
    let approver = ApproverId::new();

    assert_eq!(
        close.decline(flagged.id, approver, "  ", at()),
        Err(CloseError::ReasonRequired)
    );
    close
        .decline(flagged.id, approver, "Servicing file is stale", at())
        .unwrap();

    assert_eq!(close.status(), CloseStatus::Failed);
    assert_eq!(
        close.failure().map(|f| f.kind),
        Some(FailureKind::ReviewDeclined)
    );
    assert_eq!(close.declines()[0].reason, "Servicing file is stale");
    assert_eq!(close.exit_status(), Some(ExitStatus::NeedsAttention));
}

#[test]
fn test_second_run_rejected_while_active() {
    let mut close = PeriodClose::new(context());
    close.begin_run(RunId::new()).unwrap();
    let err = close.begin_run(RunId::new()).unwrap_err();
    assert_eq!(err.error_code(), "RUN_IN_PROGRESS");
}

#[test]
fn test_stale_run_cannot_act() {
    let (mut close, run, _) = reconciled(vec![]);
    let other = RunId::new();
    assert_eq!(
        close.record_posting(other, JournalEntryId::derive("e")),
        Err(CloseError::StaleRun { run_id: other })
    );

    close.abandon("operator stopped the run").unwrap();
    assert!(close.active_run().is_none());
    assert!(close.ensure_can_post(run).is_err());
    assert_eq!(close.failure().map(|f| f.kind), Some(FailureKind::Abandoned));
}

#[test]
fn test_closed_period_rejects_everything() {
    let (mut close, run, _) = reconciled(vec![]);
    close.mark_posted(run).unwrap();
    close.close(run).unwrap();

    assert_eq!(
        close.begin_run(RunId::new()),
        Err(CloseError::PeriodClosed { context: context() })
    );
    assert!(close.fail(FailureKind::InvalidInput, "late").is_err());
    assert!(close.restart().is_err());
}

#[test]
fn test_restart_keeps_posted_set() {
    let (mut close, run, _) = reconciled(vec![]);
    let entry_id = JournalEntryId::derive("e");
    close.record_posting(run, entry_id).unwrap();
    close.fail(FailureKind::PostingTransient, "timeout").unwrap();
    assert_eq!(close.exit_status(), Some(ExitStatus::NeedsAttention));

    close.restart().unwrap();
    assert_eq!(close.status(), CloseStatus::Open);
    assert!(close.failure().is_none());
    assert!(close.is_posted(entry_id));
}

#[test]
fn test_resume_only_from_generating() {
    let mut close = PeriodClose::new(context());
    assert!(close.resume_run(RunId::new()).is_err());

    let (mut close, run, _) = reconciled(vec![]);
    close.end_run(run);
    let resumed = RunId::new();
    close.resume_run(resumed).unwrap();
    assert_eq!(close.active_run(), Some(resumed));
    assert!(close.ensure_can_post(resumed).is_ok());
}

#[rstest]
#[case(CloseStatus::Open, CloseStatus::Parsing, true)]
#[case(CloseStatus::Parsing, CloseStatus::Reconciling, true)]
#[case(CloseStatus::Reconciling, CloseStatus::AwaitingReview, true)]
#[case(CloseStatus::Reconciling, CloseStatus::Generating, true)]
#[case(CloseStatus::AwaitingReview, CloseStatus::Generating, true)]
#[case(CloseStatus::Generating, CloseStatus::Posted, true)]
#[case(CloseStatus::Posted, CloseStatus::Closed, true)]
#[case(CloseStatus::Failed, CloseStatus::Open, true)]
#[case(CloseStatus::Generating, CloseStatus::Failed, true)]
#[case(CloseStatus::Generating, CloseStatus::AwaitingReview, false)]
#[case(CloseStatus::Posted, CloseStatus::Generating, false)]
#[case(CloseStatus::Closed, CloseStatus::Failed, false)]
#[case(CloseStatus::Closed, CloseStatus::Open, false)]
#[case(CloseStatus::Failed, CloseStatus::Failed, false)]
#[case(CloseStatus::Open, CloseStatus::Generating, false)]
fn test_transition_matrix(#[case] from: CloseStatus, #[case] to: CloseStatus, #[case] valid: bool) {
    assert_eq!(CloseTransitions::is_valid_transition(from, to), valid);
}

#[test]
fn test_serde_round_trip() {
    let flagged = record("P1", dec!(10000), DiscrepancyStatus::Flagged);
    let (mut close, _, _) = reconciled(vec![flagged.clone()]);
    close.approve(flagged.id, ApproverId::new(), at());

    let json = serde_json::to_string(&close).unwrap();
    let back: PeriodClose = serde_json::from_str(&json).unwrap();
    assert_eq!(back, close);
}
