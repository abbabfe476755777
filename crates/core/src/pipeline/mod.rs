//! The close run: one period, end to end.

pub mod checkpoint;
pub mod error;
pub mod lock;
pub mod runner;
pub mod summary;

pub use crate::close::ExitStatus;
pub use checkpoint::{CloseCheckpoint, NoCheckpoint, Published};
pub use error::CloseRunError;
pub use lock::{PeriodLockGuard, PeriodLocks};
pub use runner::CloseRunner;
pub use summary::RunSummary;
