//! Errors that stop a close run before it settles.

use monthend_shared::AppError;
use thiserror::Error;

use crate::close::{CloseError, ExitStatus};
use crate::policy::PolicyError;

/// A run that could not start or was interrupted by an invalid state.
///
/// Data problems found during a run do not surface here; they move the close
/// to `Failed` and are reported in the `RunSummary`.
#[derive(Debug, Error)]
pub enum CloseRunError {
    /// The state machine rejected the run.
    #[error(transparent)]
    Close(#[from] CloseError),

    /// The close policy is inconsistent.
    #[error("Invalid close policy: {0}")]
    Policy(#[from] PolicyError),

    /// The run's checkpoint could not be stored.
    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] AppError),
}

impl CloseRunError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Close(err) => err.error_code(),
            Self::Policy(err) => err.error_code(),
            Self::Checkpoint(err) => err.error_code(),
        }
    }

    /// Returns the exit status for this error.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Close(err) => err.exit_status(),
            Self::Policy(_) | Self::Checkpoint(_) => ExitStatus::Fatal,
        }
    }
}
