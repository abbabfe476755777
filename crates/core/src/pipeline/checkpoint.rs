//! Durable hand-off points inside a close run.
//!
//! The runner publishes the period's history when a run attaches, before
//! every submission and when the run settles. A publish is a compare and
//! swap: it only lands if the stored history is still the one the run last
//! saw, so an abandon or a competing run from another process stops this
//! one before it can post.

use async_trait::async_trait;
use monthend_shared::AppResult;
use monthend_shared::types::AccountingPeriod;
use std::fmt;

use crate::close::PeriodHistory;

/// Outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    /// The history was stored.
    Saved,
    /// The stored history changed since `expected`; carries what is stored
    /// now.
    Superseded(Option<PeriodHistory>),
}

/// Where a run persists the period it is working on.
#[async_trait]
pub trait CloseCheckpoint: Send + Sync + fmt::Debug {
    /// Stores `next` as the history of `period` if the stored history still
    /// equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the store cannot be read or written.
    async fn publish(
        &self,
        period: AccountingPeriod,
        expected: Option<&PeriodHistory>,
        next: &PeriodHistory,
    ) -> AppResult<Published>;
}

/// Keeps nothing; the caller persists the registry itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckpoint;

#[async_trait]
impl CloseCheckpoint for NoCheckpoint {
    async fn publish(
        &self,
        _period: AccountingPeriod,
        _expected: Option<&PeriodHistory>,
        _next: &PeriodHistory,
    ) -> AppResult<Published> {
        Ok(Published::Saved)
    }
}
