//! Posting gateway that writes entries to an outbox directory.
//!
//! Each accepted entry becomes `<idempotency key>.json`. A downstream
//! loader picks the files up; an existing file means the key was already
//! posted.

use async_trait::async_trait;
use monthend_core::journal::JournalEntry;
use monthend_core::posting::{PostingFailure, PostingGateway, PostingReceipt};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct OutboxDocument {
    idempotency_key: String,
    external_reference: String,
    entry: JournalEntry,
}

/// Writes posted entries to the outbox directory.
#[derive(Debug, Clone)]
pub struct OutboxGateway {
    dir: PathBuf,
}

impl OutboxGateway {
    /// Creates a gateway writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn existing(&self, path: &std::path::Path) -> Result<PostingReceipt, PostingFailure> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| PostingFailure::transient(e.to_string()))?;
        let doc: OutboxDocument = serde_json::from_slice(&bytes)
            .map_err(|e| PostingFailure::permanent(format!("corrupt outbox file: {e}")))?;
        Ok(PostingReceipt {
            entry_id: doc.entry.id,
            external_reference: doc.external_reference,
            duplicate: true,
        })
    }
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl PostingGateway for OutboxGateway {
    async fn submit(
        &self,
        entry: &JournalEntry,
        idempotency_key: &str,
    ) -> Result<PostingReceipt, PostingFailure> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PostingFailure::transient(e.to_string()))?;
        let path = self.dir.join(format!("{idempotency_key}.json"));

        let doc = OutboxDocument {
            idempotency_key: idempotency_key.to_string(),
            external_reference: format!("OUTBOX-{idempotency_key}"),
            entry: entry.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| PostingFailure::permanent(e.to_string()))?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(key = idempotency_key, "Outbox already holds entry");
                return self.existing(&path).await;
            }
            Err(err) => return Err(PostingFailure::transient(err.to_string())),
        };
        if let Err(err) = write_all(&mut file, &json).await {
            // A half-written file would read back as a corrupt duplicate.
            fs::remove_file(&path).await.ok();
            return Err(PostingFailure::transient(err.to_string()));
        }

        Ok(PostingReceipt {
            entry_id: entry.id,
            external_reference: doc.external_reference,
            duplicate: false,
        })
    }
}
