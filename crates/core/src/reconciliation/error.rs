//! Reconciliation error types.

use monthend_shared::types::{AccountingPeriod, SourceSystem};
use thiserror::Error;

/// Errors that block reconciliation of a period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// A required source has no snapshot at all for the period.
    #[error("Missing source data: no {system} snapshot for {period}")]
    MissingSourceData {
        /// The period being reconciled.
        period: AccountingPeriod,
        /// The missing source.
        system: SourceSystem,
    },
}

impl ReconciliationError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSourceData { .. } => "MISSING_SOURCE_DATA",
        }
    }
}
