//! Accounting period and close-cycle context.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The period string was not a valid `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid accounting period '{0}', expected YYYY-MM")]
pub struct InvalidPeriod(pub String);

/// A calendar month being closed, e.g. `2026-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountingPeriod {
    year: i32,
    month: u32,
}

impl AccountingPeriod {
    /// Creates a period, returning `None` for an out-of-range month.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// Returns the year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Returns the month (1-12).
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Returns the first day of the period.
    #[must_use]
    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Returns the last day of the period (the journal entry date).
    #[must_use]
    pub fn end_date(self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl From<NaiveDate> for AccountingPeriod {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for AccountingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for AccountingPeriod {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for AccountingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountingPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One close cycle for an accounting period.
///
/// Version 1 is the original close; every reopen creates the next version
/// rather than mutating the closed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodContext {
    /// The month being closed.
    pub period: AccountingPeriod,
    /// Close version, starting at 1.
    pub version: u32,
}

impl PeriodContext {
    /// Creates the first close version of a period.
    #[must_use]
    pub const fn initial(period: AccountingPeriod) -> Self {
        Self { period, version: 1 }
    }

    /// Returns the context that supersedes this one.
    #[must_use]
    pub const fn next_version(self) -> Self {
        Self {
            period: self.period,
            version: self.version + 1,
        }
    }

    /// Returns the key used in deterministic identifiers.
    ///
    /// Version 1 renders as the bare period (`2026-01`), later versions carry
    /// a suffix (`2026-01.v2`).
    #[must_use]
    pub fn key(&self) -> String {
        if self.version <= 1 {
            self.period.to_string()
        } else {
            format!("{}.v{}", self.period, self.version)
        }
    }
}

impl fmt::Display for PeriodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
