//! The outcome of a close run, as reported to operators.

use monthend_shared::types::{DiscrepancyId, JournalEntryId, PeriodContext, RunId};
use serde::Serialize;

use crate::close::{CloseStatus, ExitStatus, FailureRecord, PeriodClose};
use crate::journal::{EntryFailure, GenerationBatch, SkippedDiscrepancy};
use crate::posting::PostingReceipt;
use crate::reconciliation::{DiscrepancyRecord, DiscrepancyStatus, RollForwardResult};

/// Everything a run produced, grouped for review.
///
/// Unmatched discrepancies are always listed; nothing is dropped silently.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// The run, absent for a status query.
    pub run_id: Option<RunId>,
    /// The close version.
    pub context: PeriodContext,
    /// Status after the run.
    pub status: CloseStatus,
    /// Process exit status.
    pub exit_status: ExitStatus,
    /// Numeric exit code.
    pub exit_code: i32,
    /// Why the close failed, if it did.
    pub failure: Option<FailureRecord>,
    /// Discrepancies within tolerance.
    pub matched: Vec<DiscrepancyRecord>,
    /// Discrepancies outside tolerance.
    pub flagged: Vec<DiscrepancyRecord>,
    /// Values reported by a single source.
    pub unmatched: Vec<DiscrepancyRecord>,
    /// Discrepancies still waiting for a reviewer.
    pub pending_review: Vec<DiscrepancyId>,
    /// Roll-forward checks.
    pub roll_forwards: Vec<RollForwardResult>,
    /// Entries generated by this run.
    pub generated: Vec<JournalEntryId>,
    /// Receipts for entries posted by this run.
    pub posted: Vec<PostingReceipt>,
    /// Discrepancies that produced no entry, with reasons.
    pub skipped: Vec<SkippedDiscrepancy>,
    /// Entries that could not be built.
    pub entry_failures: Vec<EntryFailure>,
}

impl RunSummary {
    /// Builds a summary from the close state and what this run produced.
    #[must_use]
    pub fn from_close(
        run_id: Option<RunId>,
        close: &PeriodClose,
        batch: Option<&GenerationBatch>,
        posted: Vec<PostingReceipt>,
    ) -> Self {
        let records = close.report().map_or(&[][..], |r| r.records.as_slice());
        let with_status = |status: DiscrepancyStatus| -> Vec<DiscrepancyRecord> {
            records
                .iter()
                .filter(|r| r.status == status)
                .cloned()
                .collect()
        };
        let exit_status = close.exit_status().unwrap_or(ExitStatus::Fatal);

        Self {
            run_id,
            context: close.context(),
            status: close.status(),
            exit_status,
            exit_code: exit_status.code(),
            failure: close.failure().cloned(),
            matched: with_status(DiscrepancyStatus::Matched),
            flagged: with_status(DiscrepancyStatus::Flagged),
            unmatched: with_status(DiscrepancyStatus::Unmatched),
            pending_review: close.pending_review().iter().copied().collect(),
            roll_forwards: close
                .report()
                .map(|r| r.roll_forwards.clone())
                .unwrap_or_default(),
            generated: batch
                .map(|b| b.entries.iter().map(|e| e.id).collect())
                .unwrap_or_default(),
            posted,
            skipped: batch.map(|b| b.skipped.clone()).unwrap_or_default(),
            entry_failures: batch.map(|b| b.failures.clone()).unwrap_or_default(),
        }
    }

    /// Returns true if the period closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == CloseStatus::Closed
    }
}
