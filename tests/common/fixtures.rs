//! Key generators and instrumented fetchers

use fetch_fanout::{FetchError, Fetcher, Key};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// `count` endpoint addresses, `https://api.example.com/endpoint1` onwards
pub fn endpoints(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://api.example.com/endpoint{i}"))
        .collect()
}

/// Fetcher that records how many fetches run at the same time
///
/// Latency for the n-th call cycles through `latencies`, so runs are
/// deterministic under a paused clock. Payload is the key.
pub struct ConcurrencyProbe {
    latencies: Vec<Duration>,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(latencies: Vec<Duration>) -> Self {
        Self {
            latencies,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Highest number of overlapping fetch calls observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Fetch calls still running
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Total fetch calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for ConcurrencyProbe {
    async fn fetch(&self, key: &Key) -> Result<String, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latencies.is_empty() {
            let latency = self.latencies[call % self.latencies.len()];
            tokio::time::sleep(latency).await;
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(key.to_string())
    }
}

/// Scripted per-key behaviour for [`ScriptedFetcher`]
#[derive(Clone, Copy, Debug)]
pub enum Script {
    /// Succeed on the first attempt
    Succeed,
    /// Fail once with a transient error, then succeed
    FailOnce,
    /// Always fail with a transient error
    AlwaysTransient,
    /// Always fail with a permanent error
    AlwaysPermanent,
}

/// Fetcher that follows a script per key and counts attempts per key
pub struct ScriptedFetcher {
    scripts: HashMap<Key, Script>,
    attempts: Mutex<HashMap<Key, usize>>,
}

impl ScriptedFetcher {
    pub fn new<K: Into<Key>>(scripts: impl IntoIterator<Item = (K, Script)>) -> Self {
        Self {
            scripts: scripts.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts made for `key`
    pub fn attempts(&self, key: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&Key::from(key))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, key: &Key) -> Result<String, FetchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(key.clone()).or_insert(0);
            *n += 1;
            *n
        };
        tokio::task::yield_now().await;

        match self.scripts.get(key).copied().unwrap_or(Script::Succeed) {
            Script::Succeed => Ok(key.to_string()),
            Script::FailOnce if attempt == 1 => {
                Err(FetchError::Transient("connection reset".into()))
            }
            Script::FailOnce => Ok(key.to_string()),
            Script::AlwaysTransient => Err(FetchError::Transient(format!(
                "connection reset (attempt {attempt})"
            ))),
            Script::AlwaysPermanent => Err(FetchError::Permanent("404 not found".into())),
        }
    }
}
