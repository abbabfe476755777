//! Exponential backoff for transient posting failures.

use async_trait::async_trait;
use monthend_shared::config::PostingSettings;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::PostingFailure;
use super::gateway::{PostingGateway, PostingReceipt};
use crate::journal::JournalEntry;

/// Retry schedule for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor applied after each retry.
    pub multiplier: u32,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never waits, for tests and dry runs.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    /// Returns the delay after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PostingSettings::default())
    }
}

impl From<&PostingSettings> for RetryPolicy {
    fn from(settings: &PostingSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            multiplier: settings.backoff_multiplier.max(1),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

/// Wraps a gateway and retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> RetryingGateway<G> {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped gateway.
    #[must_use]
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: PostingGateway> PostingGateway for RetryingGateway<G> {
    async fn submit(
        &self,
        entry: &JournalEntry,
        idempotency_key: &str,
    ) -> Result<PostingReceipt, PostingFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.submit(entry, idempotency_key).await {
                Ok(receipt) => return Ok(receipt),
                Err(failure) if failure.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        entry_id = %entry.id,
                        attempt,
                        max_attempts,
                        error = %failure,
                        "Transient posting failure, retrying"
                    );
                    debug!("Retrying in {}ms", delay.as_millis());
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
