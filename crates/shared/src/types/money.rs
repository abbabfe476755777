//! Fixed-point amounts, ledger currency and precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount is a `rust_decimal::Decimal` carried at the ledger's
//! currency precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ISO 4217 currency codes supported for the ledger of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Singapore Dollar
    Sgd,
    /// Indonesian Rupiah
    Idr,
    /// Japanese Yen
    Jpy,
}

impl Currency {
    /// Returns the number of fractional digits the currency is booked at.
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Jpy => 0,
            Self::Usd | Self::Eur | Self::Sgd | Self::Idr => 2,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Eur => write!(f, "EUR"),
            Self::Sgd => write!(f, "SGD"),
            Self::Idr => write!(f, "IDR"),
            Self::Jpy => write!(f, "JPY"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "SGD" => Ok(Self::Sgd),
            "IDR" => Ok(Self::Idr),
            "JPY" => Ok(Self::Jpy),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

/// An amount carried more fractional digits than the ledger accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Amount {amount} has more than {digits} fractional digits")]
pub struct PrecisionExceeded {
    /// The offending amount.
    pub amount: Decimal,
    /// The configured number of fractional digits.
    pub digits: u32,
}

/// More fractional digits than a `Decimal` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Precision of {0} fractional digits exceeds the maximum of {max}", max = Precision::MAX_DIGITS)]
pub struct InvalidPrecision(pub u32);

/// Number of fractional digits used for every amount in a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Precision(u32);

impl Precision {
    /// Largest scale a `Decimal` supports.
    pub const MAX_DIGITS: u32 = 28;

    /// Creates a precision of `digits` fractional digits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrecision` above `MAX_DIGITS`.
    pub const fn new(digits: u32) -> Result<Self, InvalidPrecision> {
        if digits > Self::MAX_DIGITS {
            Err(InvalidPrecision(digits))
        } else {
            Ok(Self(digits))
        }
    }

    /// Returns the precision a currency is booked at.
    #[must_use]
    pub const fn for_currency(currency: Currency) -> Self {
        Self(currency.minor_units())
    }

    /// Returns the number of fractional digits.
    #[must_use]
    pub const fn digits(self) -> u32 {
        self.0
    }

    /// Returns the smallest representable unit (e.g. `0.01`).
    #[must_use]
    pub fn unit(self) -> Decimal {
        Decimal::new(1, self.0)
    }

    /// Rescales `amount` to exactly this precision.
    ///
    /// Fails instead of rounding when the amount has significant digits beyond
    /// the precision.
    pub fn normalize(self, amount: Decimal) -> Result<Decimal, PrecisionExceeded> {
        let normalized = amount.normalize();
        if normalized.scale() > self.0 {
            return Err(PrecisionExceeded {
                amount,
                digits: self.0,
            });
        }
        let mut rescaled = normalized;
        rescaled.rescale(self.0);
        Ok(rescaled)
    }

    /// Truncates `amount` toward zero at this precision.
    #[must_use]
    pub fn truncate(self, amount: Decimal) -> Decimal {
        let mut truncated = amount.round_dp_with_strategy(self.0, RoundingStrategy::ToZero);
        truncated.rescale(self.0);
        truncated
    }
}

impl TryFrom<u32> for Precision {
    type Error = InvalidPrecision;

    fn try_from(digits: u32) -> Result<Self, Self::Error> {
        Self::new(digits)
    }
}

impl From<Precision> for u32 {
    fn from(precision: Precision) -> Self {
        precision.0
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::for_currency(Currency::Usd)
    }
}

#[cfg(test)]
#[path = "money_tests.rs"]
mod tests;
