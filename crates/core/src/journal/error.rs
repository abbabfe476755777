//! Journal entry generation errors.

use monthend_shared::types::JournalEntryId;
use thiserror::Error;

use super::validation::EntryValidationError;
use crate::policy::DeltaDirection;
use crate::records::MetricName;

/// Errors raised while generating journal entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No account mapping exists for the metric and direction.
    ///
    /// Fatal for the one entry; the rest of the batch continues.
    #[error("No account mapping for metric {metric} ({direction})")]
    UnmappedMetric {
        /// The metric.
        metric: MetricName,
        /// The delta direction.
        direction: DeltaDirection,
    },

    /// A generated entry failed balance validation.
    ///
    /// Unreachable with a valid mapping table; aborts the whole batch.
    #[error("Journal entry {entry_id} is invalid: {reason}")]
    UnbalancedJournalEntry {
        /// The offending entry.
        entry_id: JournalEntryId,
        /// What the validation found.
        #[source]
        reason: EntryValidationError,
    },
}

impl GenerationError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnmappedMetric { .. } => "UNMAPPED_METRIC",
            Self::UnbalancedJournalEntry { .. } => "UNBALANCED_JOURNAL_ENTRY",
        }
    }

    /// Returns true if the error must abort the whole batch.
    #[must_use]
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::UnbalancedJournalEntry { .. })
    }
}
