//! Posting failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How the ledger classified a rejected submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingFailureKind {
    /// Temporary condition (timeout, throttling); safe to retry.
    Transient,
    /// The ledger will never accept this entry as submitted.
    Permanent,
}

impl fmt::Display for PostingFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// A submission the ledger did not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} posting failure: {message}")]
pub struct PostingFailure {
    /// Classification.
    pub kind: PostingFailureKind,
    /// Gateway message.
    pub message: String,
}

impl PostingFailure {
    /// Creates a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PostingFailureKind::Transient,
            message: message.into(),
        }
    }

    /// Creates a permanent failure.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: PostingFailureKind::Permanent,
            message: message.into(),
        }
    }

    /// Returns true if a retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == PostingFailureKind::Transient
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self.kind {
            PostingFailureKind::Transient => "POSTING_TRANSIENT",
            PostingFailureKind::Permanent => "POSTING_PERMANENT",
        }
    }
}
