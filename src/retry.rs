//! Single best-effort retry for transient failures
//!
//! A fetch that fails with a retryable error is attempted exactly one more
//! time, immediately and without backoff. Anything else is returned to the
//! caller as-is.
//!
//! # Example
//!
//! ```no_run
//! use fetch_fanout::retry::{IsRetryable, retry_once};
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let value = retry_once(|| async {
//!     // Your operation here
//!     Ok::<_, MyError>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::FetchError;
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, busy servers) should return `true`.
/// Permanent failures (not found, bad request, corrupt data) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transient(_) | FetchError::TimedOut(_) => true,
            FetchError::Permanent(_) => false,
        }
    }
}

/// Execute an async operation, retrying once if the first attempt fails with a
/// retryable error
///
/// The original error of a retried attempt is logged and dropped; when the
/// retry fails too, its error is the one returned.
pub async fn retry_once<F, Fut, T, E>(mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_retryable() => {
            tracing::warn!(error = %e, "Operation failed with transient error, retrying once");
            match operation().await {
                Ok(value) => {
                    tracing::info!(attempts = 2, "Operation succeeded after retry");
                    Ok(value)
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempts = 2, "Retry failed, giving up");
                    Err(e)
                }
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Operation failed with non-retryable error");
            Err(e)
        }
    }
}
