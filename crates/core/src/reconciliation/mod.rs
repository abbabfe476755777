//! Reconciliation of source snapshots under tolerance.
//!
//! For every (portfolio, metric) the authoritative value is compared with
//! each other source. The primary comparison can drive a journal entry; any
//! further sources are cross-checks. Values reported by a single source are
//! surfaced as unmatched rather than dropped.

pub mod engine;
pub mod error;
pub mod rollforward;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::ReconciliationEngine;
pub use error::ReconciliationError;
pub use rollforward::RollForwardResult;
pub use types::{
    DiscrepancyRecord, DiscrepancyRole, DiscrepancyStatus, ReconciliationReport, SourceValue,
};
