//! Shared types, errors, and configuration for Monthend.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs, both random and derived from logical keys
//! - Fixed-point precision and the ledger currency
//! - Accounting periods and close-cycle context
//! - Source system tags
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
