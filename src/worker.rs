//! Worker task: fetch one key under a limiter permit and report the outcome
//!
//! Lifecycle of a single key:
//! 1. Wait for a limiter permit
//! 2. Fetch, retrying once on a transient error
//! 3. Release the permit
//! 4. Send `(key, outcome)` on the result conduit
//!
//! Every error is turned into [`Outcome::Failure`] here, so nothing a fetcher
//! does can escape into the dispatcher.

use crate::conduit::ResultSender;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::limiter::Limiter;
use crate::retry::retry_once;
use crate::types::{FetchResult, Key, Outcome};
use std::sync::Arc;
use std::time::Duration;

/// Everything one worker task needs
pub struct WorkerContext {
    /// Key to fetch
    pub key: Key,
    /// Operation to run for the key
    pub fetcher: Arc<dyn Fetcher>,
    /// Gate shared with the other workers of the batch
    pub limiter: Limiter,
    /// Where the result goes
    pub results: ResultSender,
    /// Per-attempt timeout
    pub fetch_timeout: Option<Duration>,
}

/// Run one worker task to completion and return the outcome it sent
///
/// If the conduit's receiver is gone the result is logged and dropped; the
/// outcome is still returned so the dispatcher can count it.
pub async fn run_worker(ctx: WorkerContext) -> Outcome {
    let WorkerContext {
        key,
        fetcher,
        limiter,
        results,
        fetch_timeout,
    } = ctx;

    let outcome = match limiter.acquire().await {
        Ok(permit) => {
            tracing::debug!(key = %key, in_flight = limiter.in_flight(), "Fetch started");
            let outcome = fetch_outcome(&key, fetcher.as_ref(), fetch_timeout).await;
            permit.release();
            outcome
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Could not acquire limiter permit");
            Outcome::Failure {
                message: e.to_string(),
            }
        }
    };

    match &outcome {
        Outcome::Success { .. } => tracing::debug!(key = %key, "Fetch succeeded"),
        Outcome::Failure { message } => {
            tracing::debug!(key = %key, error = %message, "Fetch failed")
        }
    }

    let result = FetchResult {
        key: key.clone(),
        outcome: outcome.clone(),
    };
    if let Err(e) = results.send(result).await {
        tracing::warn!(key = %key, error = %e, "Result dropped, consumer went away");
    }

    outcome
}

/// Fetch with a single retry and fold the result into an [`Outcome`]
async fn fetch_outcome(key: &Key, fetcher: &dyn Fetcher, timeout: Option<Duration>) -> Outcome {
    match retry_once(|| attempt(fetcher, key, timeout)).await {
        Ok(payload) => Outcome::Success { payload },
        Err(e) => Outcome::Failure {
            message: e.to_string(),
        },
    }
}

async fn attempt(
    fetcher: &dyn Fetcher,
    key: &Key,
    timeout: Option<Duration>,
) -> Result<String, FetchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(key))
            .await
            .unwrap_or_else(|_| Err(FetchError::TimedOut(limit))),
        None => fetcher.fetch(key).await,
    }
}
