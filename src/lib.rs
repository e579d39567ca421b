//! # fetch-fanout
//!
//! Bounded-concurrency fan-out for independent fetch operations.
//!
//! Give the [`Dispatcher`] a batch of keys and it runs at most
//! `max_concurrent_fetches` of them at a time, retries each transient failure
//! once, and streams one `(key, outcome)` pair per key back as they complete.
//!
//! ## Design Philosophy
//!
//! - **Errors are data** - a failed fetch is an [`Outcome::Failure`], never a lost result
//! - **One result per key** - the stream closes only after every key has reported
//! - **Pluggable operation** - anything implementing [`Fetcher`] can be fanned out
//! - **Library-first** - no global state, no subscriber installed, no printing
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetch_fanout::{Config, Consumer, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::with_mock(Config::default())?;
//!     let keys = (1..=10).map(|i| format!("https://api.example.com/endpoint{i}"));
//!
//!     let (results, batch) = dispatcher.dispatch(keys)?;
//!     let mut consumer = Consumer::new(std::io::stdout());
//!     consumer.drain(results).await?;
//!
//!     let summary = batch.await?;
//!     println!("{} ok, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Result conduit between workers and the consumer
pub mod conduit;
/// Configuration types
pub mod config;
/// Rendering of results
pub mod consumer;
/// Batch fan-out
pub mod dispatcher;
/// Error types
pub mod error;
/// Fetch operation trait and mock implementation
pub mod fetcher;
/// Concurrency limiter
pub mod limiter;
/// Single retry for transient failures
pub mod retry;
/// Core types
pub mod types;
/// Per-key worker task
pub mod worker;

// Re-export commonly used types
pub use conduit::{ResultSender, ResultStream};
pub use config::{Config, MockConfig};
pub use consumer::Consumer;
pub use dispatcher::Dispatcher;
pub use error::{Error, FetchError, Result};
pub use fetcher::{FnFetcher, Fetcher, MockFetcher};
pub use limiter::{Limiter, LimiterPermit};
pub use retry::IsRetryable;
pub use types::{BatchSummary, FetchResult, Key, Outcome};
