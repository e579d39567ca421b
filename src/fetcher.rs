//! The fetch operation seam and its simulated implementation
//!
//! The dispatcher only ever talks to a [`Fetcher`]. Production code plugs in
//! its own implementation (or a closure through [`FnFetcher`]); tests and the
//! demo use [`MockFetcher`], which sleeps for a randomly chosen latency and can
//! inject transient or permanent failures per key.

use crate::config::MockConfig;
use crate::error::FetchError;
use crate::types::Key;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Abstraction over fetching the payload for one key
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the payload for `key`
    ///
    /// Return a retryable [`FetchError`] for transient failures; the worker
    /// will try once more. Any other error ends the key as a failure.
    async fn fetch(&self, key: &Key) -> Result<String, FetchError>;
}

/// [`Fetcher`] backed by an async closure
///
/// ```
/// use fetch_fanout::{FetchError, FnFetcher, Key};
///
/// let fetcher = FnFetcher::new(|key: Key| async move {
///     Ok::<_, FetchError>(format!("body of {key}"))
/// });
/// # let _ = fetcher;
/// ```
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F> {
    /// Wrap `f` as a fetcher
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F, Fut> Fetcher for FnFetcher<F>
where
    F: Fn(Key) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, FetchError>> + Send + 'static,
{
    async fn fetch(&self, key: &Key) -> Result<String, FetchError> {
        (self.f)(key.clone()).await
    }
}

/// Injected failure for one key
#[derive(Debug)]
enum Fault {
    /// Fail with a transient error this many more times, then succeed
    Transient { remaining: AtomicU32 },
    /// Always fail with this message
    Permanent { message: String },
}

/// Simulated fetcher with variable latency
///
/// Every call sleeps for one of the configured latencies, picked at random,
/// and then resolves. The payload of a successful fetch is the key itself.
#[derive(Debug)]
pub struct MockFetcher {
    latencies: Vec<Duration>,
    faults: HashMap<Key, Fault>,
    attempts: AtomicU64,
}

impl MockFetcher {
    /// Create a mock that sleeps for one of `latencies` on every call
    ///
    /// An empty list means no simulated latency.
    pub fn new(latencies: Vec<Duration>) -> Self {
        Self {
            latencies,
            faults: HashMap::new(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Create a mock from the `mock` section of the config
    pub fn from_config(config: &MockConfig) -> Self {
        Self::new(config.latencies.clone())
    }

    /// Create a mock that resolves without any delay
    pub fn instant() -> Self {
        Self::new(Vec::new())
    }

    /// Make `key` fail with a transient error on its first `times` attempts
    #[must_use]
    pub fn with_transient_failures(mut self, key: impl Into<Key>, times: u32) -> Self {
        self.faults.insert(
            key.into(),
            Fault::Transient {
                remaining: AtomicU32::new(times),
            },
        );
        self
    }

    /// Make every attempt for `key` fail with a permanent error
    #[must_use]
    pub fn with_permanent_failure(
        mut self,
        key: impl Into<Key>,
        message: impl Into<String>,
    ) -> Self {
        self.faults.insert(
            key.into(),
            Fault::Permanent {
                message: message.into(),
            },
        );
        self
    }

    /// Total number of fetch calls made so far, across all keys
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn pick_latency(&self) -> Duration {
        self.latencies
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::from_config(&MockConfig::default())
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, key: &Key) -> Result<String, FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let latency = self.pick_latency();
        tracing::debug!(key = %key, latency_ms = latency.as_millis() as u64, "Simulating fetch");

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.faults.get(key) {
            Some(Fault::Permanent { message }) => Err(FetchError::Permanent(message.clone())),
            Some(Fault::Transient { remaining }) => {
                let failed = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failed {
                    Err(FetchError::Transient(format!("simulated I/O failure for {key}")))
                } else {
                    Ok(key.to_string())
                }
            }
            None => Ok(key.to_string()),
        }
    }
}
