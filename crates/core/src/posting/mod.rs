//! Posting journal entries to the ledger of record.
//!
//! The ledger is reached through `PostingGateway`. Every submission carries
//! the entry's idempotency key, and transient failures are retried with
//! exponential backoff by `RetryingGateway`.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod retry;

pub use error::{PostingFailure, PostingFailureKind};
pub use gateway::{PostingGateway, PostingReceipt};
pub use memory::InMemoryGateway;
pub use retry::{RetryPolicy, RetryingGateway};

#[cfg(test)]
pub(crate) fn test_entry(portfolio: &str) -> crate::journal::JournalEntry {
    use crate::journal::{AccountRef, EntrySide, JournalEntry, JournalEntryLine};
    use crate::policy::DeltaDirection;
    use crate::records::{MetricName, PortfolioId};
    use monthend_shared::types::{AccountingPeriod, DiscrepancyId, PeriodContext};
    use rust_decimal_macros::dec;

    let period = PeriodContext::initial(AccountingPeriod::new(2026, 1).unwrap());
    let metric = MetricName::from("charge_off_total");
    let portfolio = PortfolioId::from(portfolio);
    let line = |code: &str, side| JournalEntryLine {
        account: AccountRef::new(code, code),
        side,
        amount: dec!(10.00),
        memo: String::new(),
    };
    JournalEntry {
        id: JournalEntry::derive_id(&period, &metric, &portfolio),
        period,
        entry_date: period.period.end_date(),
        discrepancy_id: DiscrepancyId::derive("test"),
        portfolio,
        metric,
        direction: DeltaDirection::Positive,
        memo: "test".to_string(),
        lines: vec![line("5100", EntrySide::Debit), line("1400", EntrySide::Credit)],
    }
}
