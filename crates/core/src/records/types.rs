//! Canonical record types shared by every source adapter.

use monthend_shared::types::{AccountingPeriod, SourceSystem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate string-backed identifiers.
macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                let value = value.into();
                Self(value.trim().to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(PortfolioId, "Identifier of a portfolio tracked as one reconciliation unit.");
string_id!(
    MetricName,
    "Name of a reported metric, e.g. `charge_off_total` or `unearned_revenue_balance`."
);

/// One normalized fact reported by a source system.
///
/// Produced by source adapters; immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// The portfolio the fact describes.
    pub portfolio: PortfolioId,
    /// The metric being reported.
    pub metric: MetricName,
    /// Fixed-point amount.
    pub amount: Decimal,
    /// The system that reported the fact.
    pub source: SourceSystem,
    /// The accounting period the fact belongs to.
    pub period: AccountingPeriod,
}

impl CanonicalRecord {
    /// Creates a new canonical record.
    #[must_use]
    pub fn new(
        portfolio: impl Into<PortfolioId>,
        metric: impl Into<MetricName>,
        amount: Decimal,
        source: SourceSystem,
        period: AccountingPeriod,
    ) -> Self {
        Self {
            portfolio: portfolio.into(),
            metric: metric.into(),
            amount,
            source,
            period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_string_ids_trim() {
        assert_eq!(PortfolioId::new("  SC-1 ").as_str(), "SC-1");
        assert!(MetricName::new("   ").is_empty());
    }

    #[test]
    fn test_string_ids_order() {
        assert!(PortfolioId::from("A") < PortfolioId::from("B"));
    }

    #[test]
    fn test_record_serde() {
        let period = AccountingPeriod::new(2026, 1).unwrap();
        let record = CanonicalRecord::new(
            "P1",
            "charge_off_total",
            dec!(125430.12),
            SourceSystem::LoanServicingRegister,
            period,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["portfolio"], "P1");
        assert_eq!(json["amount"], "125430.12");
        assert_eq!(json["source"], "loan_servicing_register");
        assert_eq!(json["period"], "2026-01");

        let back: CanonicalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
