//! Fan ten simulated endpoint fetches out two at a time
//!
//! Each fetch sleeps for 1, 2 or 3 seconds before resolving. Endpoints 3 and 7
//! fail once with a transient error (and succeed on retry); endpoint 9 fails
//! for good.
//!
//! Usage: RUST_LOG=fetch_fanout=debug cargo run --example fetch_endpoints

use fetch_fanout::{Config, Consumer, Dispatcher, MockFetcher};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let endpoints: Vec<String> = (1..=10)
        .map(|i| format!("https://api.example.com/endpoint{i}"))
        .collect();

    let config = Config::default();
    let fetcher = MockFetcher::from_config(&config.mock)
        .with_transient_failures(endpoints[2].as_str(), 1)
        .with_transient_failures(endpoints[6].as_str(), 1)
        .with_permanent_failure(endpoints[8].as_str(), "404 not found");

    let dispatcher = Dispatcher::new(config, Arc::new(fetcher))?;
    let (results, batch) = dispatcher.dispatch(endpoints)?;

    let mut consumer = Consumer::new(std::io::stdout());
    consumer.drain(results).await?;

    let summary = batch.await?;
    println!(
        "{} endpoints: {} succeeded, {} failed (peak concurrency {})",
        summary.total,
        summary.succeeded,
        summary.failed,
        dispatcher.limiter().peak_in_flight()
    );

    Ok(())
}
