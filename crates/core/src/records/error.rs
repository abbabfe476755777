//! Ingestion error types.

use monthend_shared::types::{AccountingPeriod, SourceSystem};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{MetricName, PortfolioId};

/// Errors raised while normalizing source records into snapshots.
///
/// Every variant is an input error: the close never guesses at malformed data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// A record carried an empty portfolio or metric identifier.
    #[error("Record from {system} has an empty {field}")]
    EmptyIdentifier {
        /// The adapter's source.
        system: SourceSystem,
        /// Which identifier was empty.
        field: &'static str,
    },

    /// An adapter emitted a record tagged with another source.
    #[error("Adapter for {expected} produced a record tagged {found}")]
    SourceMismatch {
        /// The adapter's source.
        expected: SourceSystem,
        /// The source on the record.
        found: SourceSystem,
    },

    /// A record belongs to a different period than the one being closed.
    #[error("Record for {portfolio}/{metric} belongs to {found}, expected {expected}")]
    PeriodMismatch {
        /// Portfolio of the record.
        portfolio: PortfolioId,
        /// Metric of the record.
        metric: MetricName,
        /// The period being closed.
        expected: AccountingPeriod,
        /// The period on the record.
        found: AccountingPeriod,
    },

    /// An amount carried more fractional digits than the configured precision.
    #[error("Amount {amount} for {portfolio}/{metric} from {system} exceeds {digits} fractional digits")]
    PrecisionExceeded {
        /// Portfolio of the record.
        portfolio: PortfolioId,
        /// Metric of the record.
        metric: MetricName,
        /// Source of the record.
        system: SourceSystem,
        /// The offending amount.
        amount: Decimal,
        /// The configured precision.
        digits: u32,
    },

    /// The same source reported the same metric twice for a portfolio.
    #[error("Duplicate record for {portfolio}/{metric} from {system}")]
    DuplicateRecord {
        /// Portfolio of the record.
        portfolio: PortfolioId,
        /// Metric of the record.
        metric: MetricName,
        /// Source of the record.
        system: SourceSystem,
    },

    /// Raw input could not be decoded.
    #[error("Failed to decode records for {system}: {message}")]
    Decode {
        /// The adapter's source.
        system: SourceSystem,
        /// Decoder message.
        message: String,
    },
}

impl IngestionError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyIdentifier { .. } => "EMPTY_IDENTIFIER",
            Self::SourceMismatch { .. } => "SOURCE_MISMATCH",
            Self::PeriodMismatch { .. } => "PERIOD_MISMATCH",
            Self::PrecisionExceeded { .. } => "PRECISION_EXCEEDED",
            Self::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            Self::Decode { .. } => "DECODE_FAILED",
        }
    }
}
