//! Canonical record model and ingestion.
//!
//! Source adapters produce `CanonicalRecord`s; the `Ingestor` validates them
//! and groups them into one `PortfolioSnapshot` per (portfolio, source).

pub mod adapter;
pub mod error;
pub mod ingest;
pub mod snapshot;
pub mod types;

pub use adapter::{JsonRecordsAdapter, SourceAdapter, StaticRecords};
pub use error::IngestionError;
pub use ingest::Ingestor;
pub use snapshot::{PortfolioSnapshot, SnapshotSet};
pub use types::{CanonicalRecord, MetricName, PortfolioId};
