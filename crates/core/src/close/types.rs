//! Period close lifecycle types.

use chrono::{DateTime, Utc};
use monthend_shared::types::{ApproverId, DiscrepancyId, PeriodContext, RunId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one close version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStatus {
    /// Created, no run started.
    Open,
    /// Ingesting source snapshots.
    Parsing,
    /// Comparing snapshots.
    Reconciling,
    /// Waiting for explicit approval of flagged discrepancies.
    AwaitingReview,
    /// Generating and posting entries.
    Generating,
    /// Every entry posted.
    Posted,
    /// Close complete (terminal).
    Closed,
    /// Halted with an error kind; restarted only by an operator.
    Failed,
}

impl CloseStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Open,
        Self::Parsing,
        Self::Reconciling,
        Self::AwaitingReview,
        Self::Generating,
        Self::Posted,
        Self::Closed,
        Self::Failed,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Parsing => "parsing",
            Self::Reconciling => "reconciling",
            Self::AwaitingReview => "awaiting_review",
            Self::Generating => "generating",
            Self::Posted => "posted",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s.to_lowercase())
    }

    /// Returns true for the terminal `Closed` status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process exit status of a close run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// The period closed.
    Closed,
    /// Review or a rerun is needed.
    NeedsAttention,
    /// Fatal configuration or input error.
    Fatal,
}

impl ExitStatus {
    /// Returns the process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Closed => 0,
            Self::NeedsAttention => 1,
            Self::Fatal => 2,
        }
    }
}

/// The error kind that moved a close to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A required source had no data for the period.
    MissingSourceData,
    /// Source records were malformed.
    InvalidInput,
    /// At least one entry had no account mapping.
    UnmappedMetric,
    /// A generated entry failed balance validation.
    UnbalancedEntry,
    /// Posting kept failing transiently after all retries.
    PostingTransient,
    /// The ledger rejected an entry.
    PostingPermanent,
    /// A reviewer declined a flagged discrepancy.
    ReviewDeclined,
    /// An operator abandoned the run.
    Abandoned,
}

impl FailureKind {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSourceData => "missing_source_data",
            Self::InvalidInput => "invalid_input",
            Self::UnmappedMetric => "unmapped_metric",
            Self::UnbalancedEntry => "unbalanced_entry",
            Self::PostingTransient => "posting_transient",
            Self::PostingPermanent => "posting_permanent",
            Self::ReviewDeclined => "review_declined",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns the exit status a failure of this kind maps to.
    ///
    /// Review outcomes and exhausted transient failures need attention;
    /// everything else is a fatal configuration or input error.
    #[must_use]
    pub const fn exit_status(self) -> ExitStatus {
        match self {
            Self::ReviewDeclined | Self::PostingTransient | Self::Abandoned => {
                ExitStatus::NeedsAttention
            }
            Self::MissingSourceData
            | Self::InvalidInput
            | Self::UnmappedMetric
            | Self::UnbalancedEntry
            | Self::PostingPermanent => ExitStatus::Fatal,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a close failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Error kind.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

/// An explicit approval of a discrepancy under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// The approved discrepancy.
    pub discrepancy_id: DiscrepancyId,
    /// Who approved it.
    pub approver: ApproverId,
    /// When it was approved.
    pub approved_at: DateTime<Utc>,
    /// The delta that was approved; a different delta needs a new approval.
    pub approved_delta: Option<Decimal>,
}

/// An explicit rejection of a discrepancy under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decline {
    /// The declined discrepancy.
    pub discrepancy_id: DiscrepancyId,
    /// Who declined it.
    pub approver: ApproverId,
    /// When it was declined.
    pub declined_at: DateTime<Utc>,
    /// Reviewer's reason.
    pub reason: String,
}

/// Audit record of a reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reopening {
    /// The closed version being superseded.
    pub supersedes: PeriodContext,
    /// Who reopened the period.
    pub actor: ApproverId,
    /// Why.
    pub reason: String,
    /// When.
    pub reopened_at: DateTime<Utc>,
}

/// One entry of the transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Status before.
    pub from: CloseStatus,
    /// Status after.
    pub to: CloseStatus,
    /// The run that caused it, if any.
    pub run_id: Option<RunId>,
    /// Optional note, e.g. the failure message.
    pub note: Option<String>,
}

/// Why an approval was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReviewRejection {
    /// The period is not awaiting review.
    NotAwaitingReview {
        /// Current status.
        status: CloseStatus,
    },
    /// No discrepancy with that id exists in this close.
    UnknownDiscrepancy,
    /// The discrepancy does not need (or no longer needs) review.
    NotPendingReview,
}

/// Result of an approval at the review boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// The approval was recorded.
    Accepted {
        /// Discrepancies still awaiting review.
        remaining: usize,
        /// True if this approval moved the close to `Generating`.
        transitioned: bool,
    },
    /// The approval was not recorded.
    Rejected {
        /// Why.
        rejection: ReviewRejection,
    },
}

impl ReviewOutcome {
    /// Returns true if the approval was recorded.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}
