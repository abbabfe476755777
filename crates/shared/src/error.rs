//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised at the process boundary, outside the close itself.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input file could not be read or decoded.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Persisted state could not be read or written.
    #[error("State store error: {0}")]
    State(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code for this error.
    ///
    /// Every boundary failure is a fatal configuration or input error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        2
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Input(_) => "INVALID_INPUT",
            Self::State(_) => "STATE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Input(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
