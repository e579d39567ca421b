//! Fans a batch of keys out to worker tasks
//!
//! [`Dispatcher::dispatch`] creates a fresh result conduit, spawns a batch
//! task that spawns one worker per key, and hands the stream back right away
//! so the consumer can drain while the batch runs. The batch task:
//! 1. Spawns every worker as its own task (no ordering between them)
//! 2. Joins all of them; a worker that panicked still gets a failure result
//! 3. Closes the conduit, then resolves its handle with a [`BatchSummary`]
//!
//! Because the conduit is closed only after every worker has been joined,
//! and every worker sends before it exits, the stream cannot end before the
//! last result is on it. Workers do not depend on the batch task: if its
//! handle is aborted they still finish, and their sender clones keep the
//! stream open until the last result is sent.

use crate::conduit::{self, ResultSender, ResultStream};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, MockFetcher};
use crate::limiter::Limiter;
use crate::types::{BatchSummary, FetchResult, Key};
use crate::worker::{WorkerContext, run_worker};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bounded fan-out engine for one fetch operation
///
/// ```no_run
/// use fetch_fanout::{Config, Dispatcher};
///
/// # async fn example() -> fetch_fanout::Result<()> {
/// let dispatcher = Dispatcher::with_mock(Config::default())?;
/// let keys = (1..=10).map(|i| format!("https://api.example.com/endpoint{i}"));
///
/// let (mut results, batch) = dispatcher.dispatch(keys)?;
/// while let Some(result) = results.recv().await {
///     println!("{}: {:?}", result.key, result.outcome);
/// }
/// let summary = batch.await.map_err(|e| fetch_fanout::Error::Other(e.to_string()))?;
/// assert_eq!(summary.total, 10);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    limiter: Limiter,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher running `fetcher` with the limits from `config`
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        let limiter = Limiter::new(config.max_concurrent_fetches)?;

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            limiter,
        })
    }

    /// Create a dispatcher backed by a [`MockFetcher`] built from `config.mock`
    pub fn with_mock(config: Config) -> Result<Self> {
        config.mock.validate()?;
        let fetcher = Arc::new(MockFetcher::from_config(&config.mock));
        Self::new(config, fetcher)
    }

    /// Configuration this dispatcher was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The limiter gating this dispatcher's workers
    ///
    /// Batches dispatched concurrently from the same dispatcher share it.
    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    /// Start a batch and return its result stream plus a completion handle
    ///
    /// The stream yields exactly one result per key, in completion order, and
    /// ends once the whole batch is done. The handle resolves to the batch
    /// summary after the stream has been closed. Aborting the handle only loses
    /// the summary; the workers keep running and the stream still yields every
    /// result. Must be called from within a tokio runtime.
    pub fn dispatch<I, K>(&self, keys: I) -> Result<(ResultStream, JoinHandle<BatchSummary>)>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        let (sender, stream) = conduit::channel(self.config.result_buffer)?;

        tracing::info!(
            keys = keys.len(),
            max_concurrent = self.limiter.capacity(),
            "Dispatching batch"
        );

        let batch = BatchTask {
            keys,
            sender,
            fetcher: Arc::clone(&self.fetcher),
            limiter: self.limiter.clone(),
            fetch_timeout: self.config.fetch_timeout,
        };
        let handle = tokio::spawn(batch.run());

        Ok((stream, handle))
    }

    /// Run a batch to completion and collect its results
    pub async fn run<I, K>(&self, keys: I) -> Result<Vec<FetchResult>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let (mut stream, handle) = self.dispatch(keys)?;

        let mut results = Vec::new();
        while let Some(result) = stream.recv().await {
            results.push(result);
        }

        handle
            .await
            .map_err(|e| Error::Other(format!("batch task failed: {e}")))?;
        Ok(results)
    }
}

/// State moved into the spawned batch task
struct BatchTask {
    keys: Vec<Key>,
    sender: ResultSender,
    fetcher: Arc<dyn Fetcher>,
    limiter: Limiter,
    fetch_timeout: Option<Duration>,
}

impl BatchTask {
    async fn run(self) -> BatchSummary {
        let BatchTask {
            keys,
            sender,
            fetcher,
            limiter,
            fetch_timeout,
        } = self;

        // Workers are detached tasks: aborting this batch task drops the
        // handles below but leaves every worker running to completion.
        let mut workers = FuturesUnordered::new();
        for key in keys {
            let ctx = WorkerContext {
                key: key.clone(),
                fetcher: Arc::clone(&fetcher),
                limiter: limiter.clone(),
                results: sender.clone(),
                fetch_timeout,
            };
            let handle = tokio::spawn(run_worker(ctx));
            workers.push(async move { (key, handle.await) });
        }

        let mut summary = BatchSummary::default();
        while let Some((key, joined)) = workers.next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Worker task did not run to completion");

                    let message = if e.is_panic() {
                        "worker task panicked"
                    } else {
                        "worker task was cancelled"
                    };
                    let result = FetchResult::failure(key, message);
                    summary.record(&result.outcome);
                    if let Err(e) = sender.send(result).await {
                        tracing::warn!(error = %e, "Result dropped, consumer went away");
                    }
                }
            }
        }

        sender.close();
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch complete"
        );
        summary
    }
}
