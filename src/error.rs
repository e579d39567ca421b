//! Error types for fetch-fanout
//!
//! Two layers of errors live here:
//! - [`FetchError`] is what a [`Fetcher`](crate::fetcher::Fetcher) reports for a single key.
//!   Worker tasks turn it into an [`Outcome::Failure`](crate::types::Outcome::Failure), so it
//!   never escapes a batch.
//! - [`Error`] covers everything else the library can fail at: invalid configuration,
//!   a closed limiter or conduit, serialization.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for fetch-fanout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-fanout
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_fetches")
        key: Option<String>,
    },

    /// The limiter was closed while a task was waiting for a permit
    #[error("limiter closed: no further permits will be granted")]
    LimiterClosed,

    /// The consuming side of the result conduit went away
    #[error("result conduit closed: receiver dropped")]
    ConduitClosed,

    /// I/O error (rendering results to a writer)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific setting
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors reported by a fetch operation for a single key
///
/// The variant decides whether the worker retries: see
/// [`IsRetryable`](crate::retry::IsRetryable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transient I/O-class failure (connection reset, server busy, ...)
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// The attempt did not finish within the configured fetch timeout
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),

    /// Permanent failure; retrying would not help
    #[error("{0}")]
    Permanent(String),
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted => FetchError::Transient(e.to_string()),
            _ => FetchError::Permanent(e.to_string()),
        }
    }
}
