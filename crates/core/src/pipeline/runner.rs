//! Drives one period through ingest, reconcile, review, generate and post.

use monthend_shared::types::{AccountingPeriod, Precision, RunId, SourceSystem};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::checkpoint::{CloseCheckpoint, NoCheckpoint, Published};
use super::error::CloseRunError;
use super::lock::PeriodLocks;
use super::summary::RunSummary;
use crate::close::{CloseError, CloseRegistry, CloseStatus, FailureKind, PeriodClose, PeriodHistory};
use crate::journal::{GenerationBatch, GenerationError, JournalEntryGenerator};
use crate::policy::ClosePolicy;
use crate::posting::{PostingFailureKind, PostingGateway, RetryPolicy, RetryingGateway};
use crate::reconciliation::ReconciliationEngine;
use crate::records::{Ingestor, SourceAdapter};

/// Runs month-end closes against one ledger gateway.
///
/// All state changes go through the period's `PeriodClose`; the runner owns
/// nothing but configuration, the period lock table and the checkpoint.
#[derive(Debug)]
pub struct CloseRunner<G> {
    policy: ClosePolicy,
    precision: Precision,
    required_sources: Vec<SourceSystem>,
    gateway: RetryingGateway<G>,
    locks: PeriodLocks,
    checkpoint: Arc<dyn CloseCheckpoint>,
}

impl<G: PostingGateway> CloseRunner<G> {
    /// Creates a runner.
    ///
    /// # Arguments
    ///
    /// * `policy` - Tolerance, authority, mapping and roll-forward tables
    /// * `precision` - Fixed-point precision for every amount
    /// * `required_sources` - Sources that must report for the period
    /// * `gateway` - Ledger of record
    /// * `retry` - Backoff applied to transient posting failures
    ///
    /// # Errors
    ///
    /// Returns `Policy` if the policy tables are inconsistent.
    pub fn new(
        policy: ClosePolicy,
        precision: Precision,
        required_sources: Vec<SourceSystem>,
        gateway: G,
        retry: RetryPolicy,
    ) -> Result<Self, CloseRunError> {
        policy.validate()?;
        Ok(Self {
            policy,
            precision,
            required_sources,
            gateway: RetryingGateway::new(gateway, retry),
            locks: PeriodLocks::new(),
            checkpoint: Arc::new(NoCheckpoint),
        })
    }

    /// Publishes every run's progress to `checkpoint`.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn CloseCheckpoint>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Returns the lock table.
    #[must_use]
    pub const fn locks(&self) -> &PeriodLocks {
        &self.locks
    }

    /// Returns the underlying gateway.
    #[must_use]
    pub fn gateway(&self) -> &G {
        self.gateway.inner()
    }

    /// Runs the close for `period`.
    ///
    /// A close that review moved to `Generating` resumes from its stored
    /// reconciliation. A failed close is restarted; approvals and the posted
    /// set survive the restart. The period is published to the checkpoint
    /// when the run attaches, before every submission and when it settles.
    ///
    /// # Errors
    ///
    /// Returns `RunInProgress` if the period is locked, `PeriodClosed` if the
    /// active version is closed, `AwaitingReview` while review is open, and
    /// `StaleRun` if the stored period changed outside this run. Failures
    /// inside the run settle the close as `Failed` and are returned in the
    /// summary instead.
    pub async fn run(
        &self,
        registry: &mut CloseRegistry,
        period: AccountingPeriod,
        adapters: &[&dyn SourceAdapter],
    ) -> Result<RunSummary, CloseRunError> {
        let run_id = RunId::new();
        let _guard = self.locks.try_acquire(period, run_id)?;
        let published = registry.history(period).cloned();
        let close = registry.open(period);

        let resumed = match close.status() {
            CloseStatus::Closed => {
                warn!(period = %close.context(), "Rerun of a closed period rejected");
                return Err(CloseError::PeriodClosed {
                    context: close.context(),
                }
                .into());
            }
            CloseStatus::AwaitingReview => {
                return Err(CloseError::AwaitingReview {
                    context: close.context(),
                    pending: close.pending_review().len(),
                }
                .into());
            }
            CloseStatus::Generating if close.active_run().is_none() => {
                close.resume_run(run_id)?;
                true
            }
            CloseStatus::Failed => {
                info!(period = %close.context(), "Restarting failed close");
                close.restart()?;
                false
            }
            _ => false,
        };
        if !resumed {
            close.begin_run(run_id)?;
            info!(period = %close.context(), run_id = %run_id, "Close run started");
        }

        let mut attached = Attached {
            registry,
            period,
            run_id,
            published,
        };
        let outcome = match self.publish(&mut attached).await {
            Ok(()) if resumed => self.generate_and_post(&mut attached).await,
            Ok(()) => self.execute(&mut attached, adapters).await,
            Err(err) => Err(err),
        };
        attached.close()?.end_run(run_id);
        let settled = self.publish(&mut attached).await;
        let summary = outcome?;
        settled?;
        Ok(summary)
    }

    /// Publishes the attached period, or restores the stored one if it
    /// changed underneath the run.
    async fn publish(&self, attached: &mut Attached<'_>) -> Result<(), CloseRunError> {
        let Some(next) = attached.registry.history(attached.period) else {
            return Ok(());
        };
        match self
            .checkpoint
            .publish(attached.period, attached.published.as_ref(), next)
            .await?
        {
            Published::Saved => {
                attached.published = Some(next.clone());
                Ok(())
            }
            Published::Superseded(stored) => {
                warn!(
                    period = %attached.period,
                    run_id = %attached.run_id,
                    "Period changed outside this run, stopping"
                );
                if let Some(stored) = stored {
                    attached.registry.restore(attached.period, stored.clone());
                    attached.published = Some(stored);
                }
                Err(CloseError::StaleRun {
                    run_id: attached.run_id,
                }
                .into())
            }
        }
    }

    async fn execute(
        &self,
        attached: &mut Attached<'_>,
        adapters: &[&dyn SourceAdapter],
    ) -> Result<RunSummary, CloseRunError> {
        let run_id = attached.run_id;
        let context = attached.close()?.context();
        let snapshots = match Ingestor::new(self.precision).ingest(context.period, adapters) {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!(code = err.error_code(), "Ingestion failed: {err}");
                let close = attached.close()?;
                close.fail(FailureKind::InvalidInput, err.to_string())?;
                return Ok(RunSummary::from_close(Some(run_id), close, None, Vec::new()));
            }
        };
        let close = attached.close()?;
        close.snapshots_ingested(run_id)?;

        let engine = ReconciliationEngine::new(&self.policy, self.precision, &self.required_sources);
        let report = match engine.reconcile(context, &snapshots) {
            Ok(report) => report,
            Err(err) => {
                error!(code = err.error_code(), "Reconciliation failed: {err}");
                close.fail(FailureKind::MissingSourceData, err.to_string())?;
                return Ok(RunSummary::from_close(Some(run_id), close, None, Vec::new()));
            }
        };

        if close.reconciled(run_id, report)? == CloseStatus::AwaitingReview {
            info!(
                period = %context,
                pending = close.pending_review().len(),
                "Close awaiting review"
            );
            return Ok(RunSummary::from_close(Some(run_id), close, None, Vec::new()));
        }

        self.generate_and_post(attached).await
    }

    async fn generate_and_post(&self, attached: &mut Attached<'_>) -> Result<RunSummary, CloseRunError> {
        let run_id = attached.run_id;
        let close = attached.close()?;
        let records = close.report().map(|r| r.records.clone()).unwrap_or_default();
        let generator = JournalEntryGenerator::new(&self.policy.mappings, self.precision);

        let batch = match generator.generate(&records, &*close) {
            Ok(batch) => batch,
            Err(err) => {
                let kind = match err {
                    GenerationError::UnbalancedJournalEntry { .. } => FailureKind::UnbalancedEntry,
                    GenerationError::UnmappedMetric { .. } => FailureKind::UnmappedMetric,
                };
                error!(code = err.error_code(), "Journal generation aborted: {err}");
                close.fail(kind, err.to_string())?;
                return Ok(RunSummary::from_close(Some(run_id), close, None, Vec::new()));
            }
        };
        close.batch_generated(run_id, &batch)?;

        let mut receipts = Vec::with_capacity(batch.entries.len());
        for entry in &batch.entries {
            self.publish(attached).await?;
            let close = attached.close()?;
            close.ensure_can_post(run_id)?;
            match self.gateway.submit(entry, &entry.idempotency_key()).await {
                Ok(receipt) => {
                    info!(
                        entry_id = %entry.id,
                        reference = %receipt.external_reference,
                        duplicate = receipt.duplicate,
                        "Journal entry posted"
                    );
                    close.record_posting(run_id, entry.id)?;
                    receipts.push(receipt);
                }
                Err(failure) => {
                    let kind = match failure.kind {
                        PostingFailureKind::Transient => FailureKind::PostingTransient,
                        PostingFailureKind::Permanent => FailureKind::PostingPermanent,
                    };
                    error!(entry_id = %entry.id, code = failure.error_code(), "Posting failed: {failure}");
                    close.fail(kind, format!("Entry {}: {failure}", entry.id))?;
                    return Ok(summary(run_id, close, &batch, receipts));
                }
            }
        }

        let close = attached.close()?;
        if !batch.failures.is_empty() {
            let metrics: Vec<String> = batch
                .failures
                .iter()
                .map(|f| format!("{}/{}", f.portfolio, f.metric))
                .collect();
            close.fail(
                FailureKind::UnmappedMetric,
                format!("No account mapping for {}", metrics.join(", ")),
            )?;
            return Ok(summary(run_id, close, &batch, receipts));
        }

        close.mark_posted(run_id)?;
        close.close(run_id)?;
        info!(
            period = %close.context(),
            posted = receipts.len(),
            skipped = batch.skipped.len(),
            "Close complete"
        );
        Ok(summary(run_id, close, &batch, receipts))
    }
}

/// The period a run is attached to and the history it last published.
struct Attached<'r> {
    registry: &'r mut CloseRegistry,
    period: AccountingPeriod,
    run_id: RunId,
    published: Option<PeriodHistory>,
}

impl Attached<'_> {
    fn close(&mut self) -> Result<&mut PeriodClose, CloseError> {
        let period = self.period;
        self.registry
            .active_mut(period)
            .ok_or(CloseError::UnknownPeriod { period })
    }
}

fn summary(
    run_id: RunId,
    close: &PeriodClose,
    batch: &GenerationBatch,
    receipts: Vec<crate::posting::PostingReceipt>,
) -> RunSummary {
    RunSummary::from_close(Some(run_id), close, Some(batch), receipts)
}
