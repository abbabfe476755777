//! Policy validation errors.

use thiserror::Error;

/// A policy table is internally inconsistent.
///
/// Policies are validated once when loaded; a run never starts with an
/// invalid policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A tolerance threshold is negative.
    #[error("Tolerance for {scope} has a negative threshold")]
    NegativeTolerance {
        /// Rendered scope of the offending rule.
        scope: String,
    },

    /// Two tolerance rules share the same scope.
    #[error("Duplicate tolerance rule for {scope}")]
    DuplicateTolerance {
        /// Rendered scope of the duplicated rule.
        scope: String,
    },

    /// Two metric policies name the same metric.
    #[error("Duplicate authority policy for metric {metric}")]
    DuplicateAuthority {
        /// The metric.
        metric: String,
    },

    /// A metric policy compares a source against itself.
    #[error("Metric {metric} uses the same source as authoritative and comparison")]
    SelfComparison {
        /// The metric.
        metric: String,
    },

    /// An account mapping is malformed.
    #[error("Invalid mapping for {metric} ({direction}): {reason}")]
    InvalidMapping {
        /// The metric.
        metric: String,
        /// The delta direction.
        direction: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A roll-forward rule is malformed.
    #[error("Invalid roll-forward rule {name}: {reason}")]
    InvalidRollForward {
        /// The rule name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl PolicyError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeTolerance { .. } => "NEGATIVE_TOLERANCE",
            Self::DuplicateTolerance { .. } => "DUPLICATE_TOLERANCE",
            Self::DuplicateAuthority { .. } => "DUPLICATE_AUTHORITY",
            Self::SelfComparison { .. } => "SELF_COMPARISON",
            Self::InvalidMapping { .. } => "INVALID_MAPPING",
            Self::InvalidRollForward { .. } => "INVALID_ROLL_FORWARD",
        }
    }
}
