//! Core close logic for Monthend.
//!
//! This crate contains the month-end close with ZERO web or database
//! dependencies. Sources are read through adapters and the ledger is reached
//! through a gateway trait, so every rule here runs in-process.
//!
//! # Modules
//!
//! - `records` - Canonical records, source adapters and ingestion
//! - `policy` - Tolerance, authority, account mapping and roll-forward tables
//! - `reconciliation` - Source comparison under tolerance
//! - `journal` - Balanced, deterministic journal entry generation
//! - `close` - Period state machine and version registry
//! - `posting` - Ledger gateway with retry and backoff
//! - `pipeline` - The close run, end to end

pub mod close;
pub mod journal;
pub mod pipeline;
pub mod policy;
pub mod posting;
pub mod reconciliation;
pub mod records;
