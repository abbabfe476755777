//! Period close state machine.
//!
//! `PeriodClose` is the single owner of a close version's status. Every
//! change goes through `CloseTransitions::is_valid_transition` and is
//! appended to the transition log. The only external input is the review
//! boundary (`approve` / `decline`); approvals are never implied.

use chrono::{DateTime, Utc};
use monthend_shared::types::{ApproverId, DiscrepancyId, JournalEntryId, PeriodContext, RunId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::error::CloseError;
use super::types::{
    Approval, CloseStatus, Decline, ExitStatus, FailureKind, FailureRecord, Reopening,
    ReviewOutcome, ReviewRejection, TransitionRecord,
};
use crate::journal::{GenerationBatch, GenerationGate, JournalEntry};
use crate::reconciliation::{DiscrepancyRecord, ReconciliationReport};

/// Stateless transition rules.
pub struct CloseTransitions;

impl CloseTransitions {
    /// Checks if a status transition is valid.
    ///
    /// The lifecycle is one-directional except for `Reviewed`
    /// (`AwaitingReview -> Generating`) and the operator restart
    /// (`Failed -> Open`). `Failed` is reachable from every status except
    /// `Closed` and `Failed` itself.
    #[must_use]
    pub fn is_valid_transition(from: CloseStatus, to: CloseStatus) -> bool {
        use CloseStatus::{
            AwaitingReview, Closed, Failed, Generating, Open, Parsing, Posted, Reconciling,
        };
        matches!(
            (from, to),
            (Open, Parsing)
                | (Parsing, Reconciling)
                | (Reconciling, AwaitingReview | Generating)
                | (AwaitingReview, Generating)
                | (Generating, Posted)
                | (Posted, Closed)
                | (Failed, Open)
                | (
                    Open | Parsing | Reconciling | AwaitingReview | Generating | Posted,
                    Failed
                )
        )
    }
}

/// One version of a period's close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodClose {
    context: PeriodContext,
    status: CloseStatus,
    #[serde(default)]
    reopening: Option<Reopening>,
    #[serde(default)]
    failure: Option<FailureRecord>,
    #[serde(default)]
    active_run: Option<RunId>,
    #[serde(default)]
    report: Option<ReconciliationReport>,
    #[serde(default)]
    pending_review: BTreeSet<DiscrepancyId>,
    #[serde(default)]
    approvals: Vec<Approval>,
    #[serde(default)]
    declines: Vec<Decline>,
    #[serde(default)]
    entries: Vec<JournalEntry>,
    #[serde(default)]
    posted: BTreeSet<JournalEntryId>,
    #[serde(default)]
    history: Vec<TransitionRecord>,
}

impl PeriodClose {
    /// Creates an open close version.
    #[must_use]
    pub fn new(context: PeriodContext) -> Self {
        Self {
            context,
            status: CloseStatus::Open,
            reopening: None,
            failure: None,
            active_run: None,
            report: None,
            pending_review: BTreeSet::new(),
            approvals: Vec::new(),
            declines: Vec::new(),
            entries: Vec::new(),
            posted: BTreeSet::new(),
            history: Vec::new(),
        }
    }

    /// Creates the version that supersedes a closed one.
    #[must_use]
    pub fn reopened(reopening: Reopening) -> Self {
        let mut close = Self::new(reopening.supersedes.next_version());
        close.reopening = Some(reopening);
        close
    }

    /// Returns the close version.
    #[must_use]
    pub fn context(&self) -> PeriodContext {
        self.context
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> CloseStatus {
        self.status
    }

    /// Returns the reopen audit record of a superseding version.
    #[must_use]
    pub fn reopening(&self) -> Option<&Reopening> {
        self.reopening.as_ref()
    }

    /// Returns why the close failed.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// Returns the run currently allowed to act on this close.
    #[must_use]
    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    /// Returns the latest reconciliation report.
    #[must_use]
    pub fn report(&self) -> Option<&ReconciliationReport> {
        self.report.as_ref()
    }

    /// Returns discrepancies awaiting an approval.
    #[must_use]
    pub fn pending_review(&self) -> &BTreeSet<DiscrepancyId> {
        &self.pending_review
    }

    /// Returns all recorded approvals.
    #[must_use]
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    /// Returns all recorded declines.
    #[must_use]
    pub fn declines(&self) -> &[Decline] {
        &self.declines
    }

    /// Returns every generated entry.
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Returns the ids of posted entries.
    #[must_use]
    pub fn posted(&self) -> &BTreeSet<JournalEntryId> {
        &self.posted
    }

    /// Returns the transition log.
    #[must_use]
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Returns the exit status of a settled close, `None` while in flight.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.status {
            CloseStatus::Closed => Some(ExitStatus::Closed),
            CloseStatus::AwaitingReview => Some(ExitStatus::NeedsAttention),
            CloseStatus::Failed => Some(
                self.failure
                    .as_ref()
                    .map_or(ExitStatus::Fatal, |f| f.kind.exit_status()),
            ),
            _ => None,
        }
    }

    fn transition(
        &mut self,
        to: CloseStatus,
        run_id: Option<RunId>,
        note: Option<String>,
    ) -> Result<(), CloseError> {
        if !CloseTransitions::is_valid_transition(self.status, to) {
            return Err(CloseError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        info!(period = %self.context, from = %self.status, to = %to, "Close transition");
        self.history.push(TransitionRecord {
            from: self.status,
            to,
            run_id,
            note,
        });
        self.status = to;
        Ok(())
    }

    fn ensure_active(&self, run_id: RunId) -> Result<(), CloseError> {
        if self.active_run == Some(run_id) {
            Ok(())
        } else {
            Err(CloseError::StaleRun { run_id })
        }
    }

    fn ensure_status(&self, expected: CloseStatus, next: CloseStatus) -> Result<(), CloseError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CloseError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    fn ensure_startable(&self) -> Result<(), CloseError> {
        if self.status.is_terminal() {
            return Err(CloseError::PeriodClosed {
                context: self.context,
            });
        }
        if self.active_run.is_some() {
            return Err(CloseError::RunInProgress {
                period: self.context.period,
            });
        }
        Ok(())
    }

    /// Starts a run: `Open -> Parsing`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed`, `RunInProgress` or `InvalidTransition`.
    pub fn begin_run(&mut self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_startable()?;
        self.transition(CloseStatus::Parsing, Some(run_id), None)?;
        self.active_run = Some(run_id);
        Ok(())
    }

    /// Attaches a run to a close that review moved to `Generating`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed`, `RunInProgress`, or `InvalidTransition` when
    /// the close is not in `Generating`.
    pub fn resume_run(&mut self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_startable()?;
        self.ensure_status(CloseStatus::Generating, CloseStatus::Generating)?;
        info!(period = %self.context, run_id = %run_id, "Resuming reviewed close");
        self.active_run = Some(run_id);
        Ok(())
    }

    /// Detaches `run_id` if it is the active run.
    pub fn end_run(&mut self, run_id: RunId) {
        if self.active_run == Some(run_id) {
            self.active_run = None;
        }
    }

    /// Snapshots are ingested: `Parsing -> Reconciling`.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn snapshots_ingested(&mut self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_active(run_id)?;
        self.transition(CloseStatus::Reconciling, Some(run_id), None)
    }

    /// Stores the reconciliation report and routes the close.
    ///
    /// Moves to `AwaitingReview` when any record needs review and has no
    /// approval for its current delta, else to `Generating`.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn reconciled(
        &mut self,
        run_id: RunId,
        report: ReconciliationReport,
    ) -> Result<CloseStatus, CloseError> {
        self.ensure_active(run_id)?;
        self.ensure_status(CloseStatus::Reconciling, CloseStatus::Generating)?;

        let pending: BTreeSet<DiscrepancyId> = report
            .needs_review()
            .filter(|record| !self.approval_matches(record))
            .map(|record| record.id)
            .collect();
        let next = if pending.is_empty() {
            CloseStatus::Generating
        } else {
            CloseStatus::AwaitingReview
        };

        self.pending_review = pending;
        self.report = Some(report);
        self.transition(next, Some(run_id), None)?;
        Ok(next)
    }

    /// Records an approval (the review boundary).
    ///
    /// When the last pending discrepancy is approved the close takes the
    /// `Reviewed` transition to `Generating`.
    pub fn approve(
        &mut self,
        discrepancy_id: DiscrepancyId,
        approver: ApproverId,
        approved_at: DateTime<Utc>,
    ) -> ReviewOutcome {
        let rejected = |rejection| ReviewOutcome::Rejected { rejection };

        if self.status != CloseStatus::AwaitingReview {
            return rejected(ReviewRejection::NotAwaitingReview {
                status: self.status,
            });
        }
        let Some(record) = self.report.as_ref().and_then(|r| r.find(discrepancy_id)) else {
            return rejected(ReviewRejection::UnknownDiscrepancy);
        };
        if !self.pending_review.contains(&discrepancy_id) {
            return rejected(ReviewRejection::NotPendingReview);
        }

        let approved_delta = record.delta;
        self.approvals.push(Approval {
            discrepancy_id,
            approver,
            approved_at,
            approved_delta,
        });
        self.pending_review.remove(&discrepancy_id);
        info!(
            period = %self.context,
            discrepancy_id = %discrepancy_id,
            approver = %approver,
            remaining = self.pending_review.len(),
            "Discrepancy approved"
        );

        let remaining = self.pending_review.len();
        let transitioned = remaining == 0
            && self
                .transition(CloseStatus::Generating, None, Some("reviewed".to_string()))
                .is_ok();
        ReviewOutcome::Accepted {
            remaining,
            transitioned,
        }
    }

    /// Records a decline and fails the close with `review_declined`.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidTransition` when not awaiting
    /// review, or `NotPendingReview`.
    pub fn decline(
        &mut self,
        discrepancy_id: DiscrepancyId,
        approver: ApproverId,
        reason: &str,
        declined_at: DateTime<Utc>,
    ) -> Result<(), CloseError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CloseError::ReasonRequired);
        }
        self.ensure_status(CloseStatus::AwaitingReview, CloseStatus::Failed)?;
        if !self.pending_review.contains(&discrepancy_id) {
            return Err(CloseError::NotPendingReview { id: discrepancy_id });
        }

        self.declines.push(Decline {
            discrepancy_id,
            approver,
            declined_at,
            reason: reason.to_string(),
        });
        self.fail(
            FailureKind::ReviewDeclined,
            format!("Discrepancy {discrepancy_id} declined: {reason}"),
        )
    }

    /// Stores a generated batch; the close stays in `Generating`.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn batch_generated(&mut self, run_id: RunId, batch: &GenerationBatch) -> Result<(), CloseError> {
        self.ensure_can_post(run_id)?;
        for entry in &batch.entries {
            match self.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => self.entries.push(entry.clone()),
            }
        }
        Ok(())
    }

    /// Checks that `run_id` may post: it is the active run and the close is
    /// generating.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn ensure_can_post(&self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_active(run_id)?;
        self.ensure_status(CloseStatus::Generating, CloseStatus::Posted)
    }

    /// Records that `entry_id` was accepted by the ledger.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn record_posting(&mut self, run_id: RunId, entry_id: JournalEntryId) -> Result<(), CloseError> {
        self.ensure_can_post(run_id)?;
        self.posted.insert(entry_id);
        Ok(())
    }

    /// Every entry is posted: `Generating -> Posted`.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn mark_posted(&mut self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_active(run_id)?;
        self.transition(CloseStatus::Posted, Some(run_id), None)
    }

    /// Completes the close: `Posted -> Closed`.
    ///
    /// # Errors
    ///
    /// Returns `StaleRun` or `InvalidTransition`.
    pub fn close(&mut self, run_id: RunId) -> Result<(), CloseError> {
        self.ensure_active(run_id)?;
        self.transition(CloseStatus::Closed, Some(run_id), None)?;
        self.active_run = None;
        Ok(())
    }

    /// Halts the close with an error kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from `Closed` or `Failed`.
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> Result<(), CloseError> {
        let message = message.into();
        let run_id = self.active_run;
        self.transition(CloseStatus::Failed, run_id, Some(message.clone()))?;
        warn!(period = %self.context, kind = %kind, "{message}");
        self.failure = Some(FailureRecord { kind, message });
        Ok(())
    }

    /// Fails the close and detaches the active run so nothing from it can
    /// post.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` or `InvalidTransition`.
    pub fn abandon(&mut self, reason: &str) -> Result<(), CloseError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CloseError::ReasonRequired);
        }
        self.fail(FailureKind::Abandoned, reason)?;
        self.active_run = None;
        Ok(())
    }

    /// Operator restart: `Failed -> Open`.
    ///
    /// Approvals and the posted set are kept, so a rerun neither asks for the
    /// same review twice nor posts an entry twice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless failed.
    pub fn restart(&mut self) -> Result<(), CloseError> {
        self.transition(CloseStatus::Open, None, Some("restart".to_string()))?;
        self.failure = None;
        self.active_run = None;
        self.pending_review.clear();
        Ok(())
    }

    fn approval_matches(&self, record: &DiscrepancyRecord) -> bool {
        self.approvals
            .iter()
            .rev()
            .find(|a| a.discrepancy_id == record.id)
            .is_some_and(|a| a.approved_delta == record.delta)
    }
}

impl GenerationGate for PeriodClose {
    fn is_approved(&self, record: &DiscrepancyRecord) -> bool {
        self.approval_matches(record)
    }

    fn is_posted(&self, entry_id: JournalEntryId) -> bool {
        self.posted.contains(&entry_id)
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
