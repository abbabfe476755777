//! Source systems that report portfolio totals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The enumerated set of systems a canonical record can come from.
///
/// The declaration order is the tie-break order used wherever sources must be
/// ranked deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    /// The loan-servicing register.
    LoanServicingRegister,
    /// Funding partner statement A.
    FundingPartnerA,
    /// Funding partner statement B.
    FundingPartnerB,
    /// Actuals from the ledger of record.
    LedgerActuals,
}

impl SourceSystem {
    /// All sources in tie-break order.
    pub const ALL: [Self; 4] = [
        Self::LoanServicingRegister,
        Self::FundingPartnerA,
        Self::FundingPartnerB,
        Self::LedgerActuals,
    ];

    /// Returns the string representation of the source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoanServicingRegister => "loan_servicing_register",
            Self::FundingPartnerA => "funding_partner_a",
            Self::FundingPartnerB => "funding_partner_b",
            Self::LedgerActuals => "ledger_actuals",
        }
    }

    /// Parses a source from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "loan_servicing_register" => Some(Self::LoanServicingRegister),
            "funding_partner_a" => Some(Self::FundingPartnerA),
            "funding_partner_b" => Some(Self::FundingPartnerB),
            "ledger_actuals" => Some(Self::LedgerActuals),
            _ => None,
        }
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
