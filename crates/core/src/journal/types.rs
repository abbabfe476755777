//! Journal entry domain types.

use chrono::NaiveDate;
use monthend_shared::types::{DiscrepancyId, JournalEntryId, PeriodContext};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::policy::DeltaDirection;
use crate::records::{MetricName, PortfolioId};

/// Side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySide {
    /// Debit line.
    Debit,
    /// Credit line.
    Credit,
}

/// Reference to a general ledger account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    /// Account code, e.g. `610500`.
    pub code: String,
    /// Account name, e.g. `Bad Debt Writeoffs`.
    pub name: String,
}

impl AccountRef {
    /// Creates an account reference.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.name)
    }
}

/// A single line of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    /// The account affected.
    pub account: AccountRef,
    /// Debit or credit.
    pub side: EntrySide,
    /// Positive amount at the close precision.
    pub amount: Decimal,
    /// Line memo.
    pub memo: String,
}

impl JournalEntryLine {
    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.side {
            EntrySide::Debit => self.amount,
            EntrySide::Credit => -self.amount,
        }
    }
}

/// A balanced correcting entry derived from one discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Deterministic id; doubles as the posting idempotency key.
    pub id: JournalEntryId,
    /// Close version the entry belongs to.
    pub period: PeriodContext,
    /// Entry date, the last day of the period.
    pub entry_date: NaiveDate,
    /// The discrepancy this entry corrects.
    pub discrepancy_id: DiscrepancyId,
    /// Portfolio of the discrepancy.
    pub portfolio: PortfolioId,
    /// Metric of the discrepancy.
    pub metric: MetricName,
    /// Direction of the corrected delta.
    pub direction: DeltaDirection,
    /// Entry memo.
    pub memo: String,
    /// The lines.
    pub lines: Vec<JournalEntryLine>,
}

impl JournalEntry {
    /// Derives the entry id for (period, metric, portfolio).
    #[must_use]
    pub fn derive_id(period: &PeriodContext, metric: &MetricName, portfolio: &PortfolioId) -> JournalEntryId {
        JournalEntryId::derive(&format!("{}|{}|{}", period.key(), metric, portfolio))
    }

    /// Returns the idempotency key used when posting.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        self.id.to_string()
    }

    /// Returns debit and credit totals.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals::of(&self.lines)
    }
}

/// Debit and credit totals of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debit lines.
    pub debit: Decimal,
    /// Sum of credit lines.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums `lines` per side.
    #[must_use]
    pub fn of(lines: &[JournalEntryLine]) -> Self {
        lines.iter().fold(Self::default(), |mut totals, line| {
            match line.side {
                EntrySide::Debit => totals.debit += line.amount,
                EntrySide::Credit => totals.credit += line.amount,
            }
            totals
        })
    }

    /// Returns true if debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

/// Why a discrepancy produced no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Only one source reported the value; never auto-corrected.
    Unmatched,
    /// The discrepancy needs review and has no approval for its delta.
    NotApproved,
    /// Authoritative and comparison values are equal.
    ZeroDelta,
    /// A cross-check comparison, never posted.
    CrossCheckOnly,
    /// The entry was already posted by an earlier run.
    AlreadyPosted,
}

impl SkipReason {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::NotApproved => "not_approved",
            Self::ZeroDelta => "zero_delta",
            Self::CrossCheckOnly => "cross_check_only",
            Self::AlreadyPosted => "already_posted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discrepancy the generator did not turn into an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDiscrepancy {
    /// The discrepancy.
    pub discrepancy_id: DiscrepancyId,
    /// Its portfolio.
    pub portfolio: PortfolioId,
    /// Its metric.
    pub metric: MetricName,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// A discrepancy whose entry could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    /// The discrepancy.
    pub discrepancy_id: DiscrepancyId,
    /// Its portfolio.
    pub portfolio: PortfolioId,
    /// Its metric.
    pub metric: MetricName,
    /// Stable error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Output of one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBatch {
    /// Entries ready to post, in discrepancy order.
    pub entries: Vec<JournalEntry>,
    /// Discrepancies that produced nothing.
    pub skipped: Vec<SkippedDiscrepancy>,
    /// Discrepancies whose entry could not be generated.
    pub failures: Vec<EntryFailure>,
}

impl GenerationBatch {
    /// Returns true if every actionable discrepancy produced an entry.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
