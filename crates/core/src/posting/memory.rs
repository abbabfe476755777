//! In-process ledger double.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use super::error::PostingFailure;
use super::gateway::{PostingGateway, PostingReceipt};
use crate::journal::JournalEntry;

/// Gateway that keeps posted entries in memory.
///
/// Failures can be scripted per idempotency key; each scripted failure is
/// consumed by one submission.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    posted: DashMap<String, (JournalEntry, PostingReceipt)>,
    scripted: DashMap<String, VecDeque<PostingFailure>>,
    attempts: AtomicU32,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues failures returned for `idempotency_key` before it succeeds.
    pub fn script(&self, idempotency_key: &str, failures: Vec<PostingFailure>) {
        self.scripted
            .entry(idempotency_key.to_string())
            .or_default()
            .extend(failures);
    }

    /// Total submissions seen, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Keys of accepted entries, sorted.
    #[must_use]
    pub fn posted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.posted.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Returns the accepted entry for `idempotency_key`.
    #[must_use]
    pub fn posted_entry(&self, idempotency_key: &str) -> Option<JournalEntry> {
        self.posted.get(idempotency_key).map(|e| e.value().0.clone())
    }
}

#[async_trait]
impl PostingGateway for InMemoryGateway {
    async fn submit(
        &self,
        entry: &JournalEntry,
        idempotency_key: &str,
    ) -> Result<PostingReceipt, PostingFailure> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(mut queue) = self.scripted.get_mut(idempotency_key) {
            if let Some(failure) = queue.pop_front() {
                return Err(failure);
            }
        }

        if let Some(existing) = self.posted.get(idempotency_key) {
            return Ok(PostingReceipt {
                duplicate: true,
                ..existing.value().1.clone()
            });
        }

        let receipt = PostingReceipt {
            entry_id: entry.id,
            external_reference: format!("MEM-{attempt:06}"),
            duplicate: false,
        };
        self.posted
            .insert(idempotency_key.to_string(), (entry.clone(), receipt.clone()));
        Ok(receipt)
    }
}
