//! Per-period run lock.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use monthend_shared::types::{AccountingPeriod, RunId};
use std::sync::Arc;
use tracing::debug;

use crate::close::CloseError;

/// Table of periods with a run in flight.
///
/// Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct PeriodLocks {
    held: Arc<DashMap<AccountingPeriod, RunId>>,
}

impl PeriodLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `period` on behalf of `run_id`.
    ///
    /// # Errors
    ///
    /// Returns `RunInProgress` if another run holds the period.
    pub fn try_acquire(
        &self,
        period: AccountingPeriod,
        run_id: RunId,
    ) -> Result<PeriodLockGuard, CloseError> {
        match self.held.entry(period) {
            Entry::Occupied(_) => Err(CloseError::RunInProgress { period }),
            Entry::Vacant(slot) => {
                slot.insert(run_id);
                debug!(period = %period, run_id = %run_id, "Period lock acquired");
                Ok(PeriodLockGuard {
                    held: Arc::clone(&self.held),
                    period,
                    run_id,
                })
            }
        }
    }

    /// Returns the run holding `period`, if any.
    #[must_use]
    pub fn holder(&self, period: AccountingPeriod) -> Option<RunId> {
        self.held.get(&period).map(|r| *r.value())
    }
}

/// Releases the period lock on drop.
#[derive(Debug)]
pub struct PeriodLockGuard {
    held: Arc<DashMap<AccountingPeriod, RunId>>,
    period: AccountingPeriod,
    run_id: RunId,
}

impl PeriodLockGuard {
    /// The run holding the lock.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl Drop for PeriodLockGuard {
    fn drop(&mut self) {
        self.held
            .remove_if(&self.period, |_, holder| *holder == self.run_id);
        debug!(period = %self.period, run_id = %self.run_id, "Period lock released");
    }
}
