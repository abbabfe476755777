//! The seam between the close and the ledger of record.

use async_trait::async_trait;
use monthend_shared::types::JournalEntryId;
use serde::{Deserialize, Serialize};

use super::error::PostingFailure;
use crate::journal::JournalEntry;

/// Ledger acknowledgement of a posted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingReceipt {
    /// The posted entry.
    pub entry_id: JournalEntryId,
    /// Reference assigned by the ledger.
    pub external_reference: String,
    /// True if the ledger had already seen the idempotency key.
    pub duplicate: bool,
}

/// Submits journal entries to the ledger.
///
/// Implementations must treat a repeated `idempotency_key` as a no-op that
/// returns the original receipt.
#[async_trait]
pub trait PostingGateway: Send + Sync {
    /// Submits one entry.
    ///
    /// # Errors
    ///
    /// Returns a `PostingFailure` classified as transient or permanent.
    async fn submit(
        &self,
        entry: &JournalEntry,
        idempotency_key: &str,
    ) -> Result<PostingReceipt, PostingFailure>;
}

