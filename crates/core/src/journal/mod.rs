//! Journal entry generation.
//!
//! Each authorized discrepancy with a non-zero delta becomes at most one
//! balanced entry. Entry ids are derived from (period, metric, portfolio) so
//! regeneration is idempotent.

pub mod allocation;
pub mod error;
pub mod generator;
pub mod types;
pub mod validation;

#[cfg(test)]
mod generator_props;

pub use allocation::AllocationUtil;
pub use error::GenerationError;
pub use generator::{GenerationGate, JournalEntryGenerator};
pub use types::{
    AccountRef, EntryFailure, EntrySide, EntryTotals, GenerationBatch, JournalEntry,
    JournalEntryLine, SkipReason, SkippedDiscrepancy,
};
pub use validation::{EntryValidationError, validate_lines};
