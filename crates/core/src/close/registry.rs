//! Versioned registry of period closes.

use chrono::{DateTime, Utc};
use monthend_shared::types::{AccountingPeriod, ApproverId, DiscrepancyId, PeriodContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::error::CloseError;
use super::machine::PeriodClose;
use super::types::{CloseStatus, Reopening, ReviewOutcome};

/// Every close version of one accounting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodHistory {
    current: PeriodClose,
    #[serde(default)]
    superseded: Vec<PeriodClose>,
}

impl PeriodHistory {
    /// Returns the active version.
    #[must_use]
    pub fn current(&self) -> &PeriodClose {
        &self.current
    }

    /// Returns superseded versions, oldest first.
    #[must_use]
    pub fn superseded(&self) -> &[PeriodClose] {
        &self.superseded
    }
}

/// All closes, keyed by accounting period.
///
/// Reopening never mutates a closed version; it appends the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseRegistry {
    periods: BTreeMap<AccountingPeriod, PeriodHistory>,
}

impl CloseRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active close of `period`, creating version 1 if needed.
    pub fn open(&mut self, period: AccountingPeriod) -> &mut PeriodClose {
        &mut self
            .periods
            .entry(period)
            .or_insert_with(|| {
                info!(period = %period, "Opened period");
                PeriodHistory {
                    current: PeriodClose::new(PeriodContext::initial(period)),
                    superseded: Vec::new(),
                }
            })
            .current
    }

    /// Returns the active close of `period`.
    #[must_use]
    pub fn active(&self, period: AccountingPeriod) -> Option<&PeriodClose> {
        self.periods.get(&period).map(|h| &h.current)
    }

    /// Returns the active close of `period` mutably.
    pub fn active_mut(&mut self, period: AccountingPeriod) -> Option<&mut PeriodClose> {
        self.periods.get_mut(&period).map(|h| &mut h.current)
    }

    /// Returns the full version history of `period`.
    #[must_use]
    pub fn history(&self, period: AccountingPeriod) -> Option<&PeriodHistory> {
        self.periods.get(&period)
    }

    /// Replaces the history of `period` with one read back from storage.
    pub fn restore(&mut self, period: AccountingPeriod, history: PeriodHistory) {
        self.periods.insert(period, history);
    }

    /// Returns every period with a close, in order.
    pub fn periods(&self) -> impl Iterator<Item = AccountingPeriod> + '_ {
        self.periods.keys().copied()
    }

    /// Reopens a closed period as a new version.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeriod`, `ReasonRequired`, or `ReopenNotAllowed`
    /// unless the active version is `Closed`.
    pub fn reopen(
        &mut self,
        period: AccountingPeriod,
        actor: ApproverId,
        reason: &str,
        reopened_at: DateTime<Utc>,
    ) -> Result<PeriodContext, CloseError> {
        let history = self
            .periods
            .get_mut(&period)
            .ok_or(CloseError::UnknownPeriod { period })?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CloseError::ReasonRequired);
        }
        let status = history.current.status();
        if status != CloseStatus::Closed {
            return Err(CloseError::ReopenNotAllowed { status });
        }

        let next = PeriodClose::reopened(Reopening {
            supersedes: history.current.context(),
            actor,
            reason: reason.to_string(),
            reopened_at,
        });
        let context = next.context();
        let previous = std::mem::replace(&mut history.current, next);
        history.superseded.push(previous);
        info!(period = %period, context = %context, actor = %actor, "Reopened period");
        Ok(context)
    }

    /// Routes an approval to the active close of `period`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeriod` if no close exists.
    pub fn approve(
        &mut self,
        period: AccountingPeriod,
        discrepancy_id: DiscrepancyId,
        approver: ApproverId,
        approved_at: DateTime<Utc>,
    ) -> Result<ReviewOutcome, CloseError> {
        let close = self
            .active_mut(period)
            .ok_or(CloseError::UnknownPeriod { period })?;
        Ok(close.approve(discrepancy_id, approver, approved_at))
    }

    /// Routes a decline to the active close of `period`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeriod` or the state machine's decline error.
    pub fn decline(
        &mut self,
        period: AccountingPeriod,
        discrepancy_id: DiscrepancyId,
        approver: ApproverId,
        reason: &str,
        declined_at: DateTime<Utc>,
    ) -> Result<(), CloseError> {
        let close = self
            .active_mut(period)
            .ok_or(CloseError::UnknownPeriod { period })?;
        close.decline(discrepancy_id, approver, reason, declined_at)
    }
}
