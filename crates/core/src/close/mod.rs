//! Period close lifecycle.
//!
//! `Open -> Parsing -> Reconciling -> [AwaitingReview ->] Generating ->
//! Posted -> Closed`, with `Failed` reachable from any non-terminal status.
//! A reopen creates a new close version instead of mutating a closed one.

pub mod error;
pub mod machine;
pub mod registry;
pub mod types;

#[cfg(test)]
mod machine_props;

pub use error::CloseError;
pub use machine::{CloseTransitions, PeriodClose};
pub use registry::{CloseRegistry, PeriodHistory};
pub use types::{
    Approval, CloseStatus, Decline, ExitStatus, FailureKind, FailureRecord, Reopening,
    ReviewOutcome, ReviewRejection, TransitionRecord,
};
