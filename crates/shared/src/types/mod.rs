//! Common types used across the close.

pub mod id;
pub mod money;
pub mod period;
pub mod source;

pub use id::*;
pub use money::{Currency, InvalidPrecision, Precision, PrecisionExceeded};
pub use period::{AccountingPeriod, InvalidPeriod, PeriodContext};
pub use source::SourceSystem;
