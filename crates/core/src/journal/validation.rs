//! Balance checks on generated lines.

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use thiserror::Error;

use super::types::{AccountRef, EntrySide, EntryTotals, JournalEntryLine};

/// Why a set of generated lines cannot become an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    /// Debit and credit totals differ.
    #[error("debits {debits} do not equal credits {credits}")]
    Unbalanced {
        /// Debit total.
        debits: Decimal,
        /// Credit total.
        credits: Decimal,
    },

    /// The mapping produced no lines.
    #[error("no lines were generated")]
    NoLines,

    /// Every line sits on the same side.
    #[error("lines touch only one side of the ledger")]
    SingleSided,

    /// A line carries zero or a negative amount.
    #[error("line on account {account} has non-positive amount {amount}")]
    NonPositiveLine {
        /// The line's account.
        account: AccountRef,
        /// The offending amount.
        amount: Decimal,
    },
}

/// Checks generated lines and returns their totals.
///
/// Lines must be non-empty, strictly positive, and touch both sides.
/// The debit and credit totals must also be equal.
///
/// # Errors
///
/// Returns the first rule the lines break.
pub fn validate_lines(lines: &[JournalEntryLine]) -> Result<EntryTotals, EntryValidationError> {
    if lines.is_empty() {
        return Err(EntryValidationError::NoLines);
    }
    if let Some(line) = lines.iter().find(|l| l.amount <= Decimal::ZERO) {
        return Err(EntryValidationError::NonPositiveLine {
            account: line.account.clone(),
            amount: line.amount,
        });
    }
    let sides: BTreeSet<EntrySide> = lines.iter().map(|l| l.side).collect();
    if sides.len() < 2 {
        return Err(EntryValidationError::SingleSided);
    }

    let totals = EntryTotals::of(lines);
    if totals.is_balanced() {
        Ok(totals)
    } else {
        Err(EntryValidationError::Unbalanced {
            debits: totals.debit,
            credits: totals.credit,
        })
    }
}
