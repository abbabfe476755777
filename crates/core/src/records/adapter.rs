//! Source adapters turn a system's raw export into canonical records.

use monthend_shared::types::{AccountingPeriod, SourceSystem};
use std::io::Read;

use super::error::IngestionError;
use super::types::CanonicalRecord;

/// A producer of canonical records for one source system.
///
/// Adapters never reconcile; they only describe what a source reported.
pub trait SourceAdapter: Send + Sync {
    /// The system this adapter reads.
    fn source(&self) -> SourceSystem;

    /// Produces the records reported for `period`.
    ///
    /// # Errors
    ///
    /// Returns an error if the raw input cannot be decoded.
    fn produce(&self, period: AccountingPeriod) -> Result<Vec<CanonicalRecord>, IngestionError>;
}

/// Adapter over records that are already canonical, e.g. fixtures.
#[derive(Debug, Clone)]
pub struct StaticRecords {
    source: SourceSystem,
    records: Vec<CanonicalRecord>,
}

impl StaticRecords {
    /// Creates an adapter serving `records` for `source`.
    #[must_use]
    pub fn new(source: SourceSystem, records: Vec<CanonicalRecord>) -> Self {
        Self { source, records }
    }
}

impl SourceAdapter for StaticRecords {
    fn source(&self) -> SourceSystem {
        self.source
    }

    fn produce(&self, _period: AccountingPeriod) -> Result<Vec<CanonicalRecord>, IngestionError> {
        Ok(self.records.clone())
    }
}

/// Adapter over a JSON array of canonical records.
///
/// Records are decoded eagerly so that malformed input fails before the
/// close starts.
#[derive(Debug, Clone)]
pub struct JsonRecordsAdapter {
    source: SourceSystem,
    records: Vec<CanonicalRecord>,
}

impl JsonRecordsAdapter {
    /// Decodes records for `source` from a JSON reader.
    ///
    /// # Errors
    ///
    /// Returns `IngestionError::Decode` if the input is not a JSON array of
    /// canonical records.
    pub fn from_reader(source: SourceSystem, reader: impl Read) -> Result<Self, IngestionError> {
        let records = serde_json::from_reader(reader).map_err(|e| IngestionError::Decode {
            system: source,
            message: e.to_string(),
        })?;
        Ok(Self { source, records })
    }

    /// Decodes records for `source` from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `IngestionError::Decode` on malformed input.
    pub fn from_json(source: SourceSystem, json: &str) -> Result<Self, IngestionError> {
        Self::from_reader(source, json.as_bytes())
    }
}

impl SourceAdapter for JsonRecordsAdapter {
    fn source(&self) -> SourceSystem {
        self.source
    }

    fn produce(&self, _period: AccountingPeriod) -> Result<Vec<CanonicalRecord>, IngestionError> {
        Ok(self.records.clone())
    }
}
