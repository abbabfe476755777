//! Close lifecycle error types.

use monthend_shared::types::{AccountingPeriod, DiscrepancyId, PeriodContext, RunId};
use thiserror::Error;

use super::types::{CloseStatus, ExitStatus};

/// Errors raised by the period state machine and registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseError {
    /// The requested status change is not allowed.
    #[error("Invalid close transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: CloseStatus,
        /// Requested status.
        to: CloseStatus,
    },

    /// The close version is already closed; reopen it first.
    #[error("Period {context} is closed")]
    PeriodClosed {
        /// The closed version.
        context: PeriodContext,
    },

    /// Another run holds the period.
    #[error("A close run for {period} is already in progress")]
    RunInProgress {
        /// The locked period.
        period: AccountingPeriod,
    },

    /// The run is not (or no longer) the period's active run.
    #[error("Run {run_id} is not the active run")]
    StaleRun {
        /// The stale run.
        run_id: RunId,
    },

    /// The period still has discrepancies awaiting review.
    #[error("Period {context} has {pending} discrepancies awaiting review")]
    AwaitingReview {
        /// The close version.
        context: PeriodContext,
        /// Number of discrepancies awaiting review.
        pending: usize,
    },

    /// No close exists for the period.
    #[error("No close exists for period {period}")]
    UnknownPeriod {
        /// The period.
        period: AccountingPeriod,
    },

    /// No discrepancy with that id is pending review.
    #[error("Discrepancy {id} is not pending review")]
    NotPendingReview {
        /// The discrepancy.
        id: DiscrepancyId,
    },

    /// Only closed periods can be reopened.
    #[error("Cannot reopen a period in status {status}")]
    ReopenNotAllowed {
        /// Current status.
        status: CloseStatus,
    },

    /// Reopen and decline need a non-empty reason.
    #[error("A reason is required")]
    ReasonRequired,
}

impl CloseError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::RunInProgress { .. } => "RUN_IN_PROGRESS",
            Self::StaleRun { .. } => "STALE_RUN",
            Self::AwaitingReview { .. } => "AWAITING_REVIEW",
            Self::UnknownPeriod { .. } => "UNKNOWN_PERIOD",
            Self::NotPendingReview { .. } => "NOT_PENDING_REVIEW",
            Self::ReopenNotAllowed { .. } => "REOPEN_NOT_ALLOWED",
            Self::ReasonRequired => "REASON_REQUIRED",
        }
    }

    /// Returns the exit status for this error.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::AwaitingReview { .. } => ExitStatus::NeedsAttention,
            _ => ExitStatus::Fatal,
        }
    }
}
