//! End-to-end tests for batch fan-out
//!
//! These tests run whole batches through the dispatcher and check:
//! - One result per key, in any order
//! - The concurrency bound, seen both from the limiter and from the fetcher
//! - The stream only ends after every result has been delivered
//! - Single-retry semantics at batch level
//! - No permits left behind after a batch

mod common;

use common::{
    ConcurrencyProbe, Script, ScriptedFetcher, assert_one_result_per_key, collect_all, endpoints,
};
use fetch_fanout::{BatchSummary, Config, Consumer, Dispatcher, MockFetcher, Outcome};
use std::sync::Arc;
use std::time::Duration;

fn config(max_concurrent: usize) -> Config {
    Config {
        max_concurrent_fetches: max_concurrent,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn four_keys_two_at_a_time_all_succeed() {
    let probe = Arc::new(ConcurrencyProbe::new(vec![
        Duration::from_millis(1000),
        Duration::from_millis(3000),
        Duration::from_millis(2000),
    ]));
    let dispatcher = Dispatcher::new(config(2), probe.clone()).unwrap();
    let keys = endpoints(4);

    let (stream, handle) = dispatcher.dispatch(keys.clone()).unwrap();
    let results = collect_all(stream).await;

    assert_one_result_per_key(&results, &keys);
    for result in &results {
        assert_eq!(
            result.outcome,
            Outcome::Success {
                payload: result.key.to_string()
            }
        );
    }
    assert_eq!(
        handle.await.unwrap(),
        BatchSummary {
            total: 4,
            succeeded: 4,
            failed: 0
        }
    );
    assert!(probe.peak() <= 2, "fetcher saw {} concurrent calls", probe.peak());
    assert_eq!(probe.peak(), 2, "two keys should have overlapped");
    assert!(dispatcher.limiter().peak_in_flight() <= 2);
}

#[tokio::test(start_paused = true)]
async fn ten_endpoints_with_random_latency() {
    let dispatcher = Dispatcher::with_mock(Config::default()).unwrap();
    let keys = endpoints(10);

    let start = tokio::time::Instant::now();
    let results = dispatcher.run(keys.clone()).await.unwrap();

    assert_one_result_per_key(&results, &keys);
    assert!(results.iter().all(|r| r.outcome.is_success()));
    // ten fetches of at least one second each, two at a time
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(dispatcher.limiter().peak_in_flight() <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bound_holds_on_a_multi_threaded_runtime() {
    let probe = Arc::new(ConcurrencyProbe::new(vec![
        Duration::from_millis(3),
        Duration::from_millis(1),
        Duration::from_millis(5),
    ]));
    let dispatcher = Dispatcher::new(config(3), probe.clone()).unwrap();
    let keys = endpoints(40);

    let results = dispatcher.run(keys.clone()).await.unwrap();

    assert_one_result_per_key(&results, &keys);
    assert!(probe.peak() <= 3, "fetcher saw {} concurrent calls", probe.peak());
    assert!(dispatcher.limiter().peak_in_flight() <= 3);
    assert_eq!(probe.calls(), 40);
    assert_eq!(probe.current(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_still_receives_everything() {
    let dispatcher = Dispatcher::new(
        Config {
            max_concurrent_fetches: 4,
            result_buffer: 1,
            ..Default::default()
        },
        Arc::new(MockFetcher::new(vec![Duration::from_millis(10)])),
    )
    .unwrap();
    let keys = endpoints(12);

    let start = tokio::time::Instant::now();
    let (mut stream, handle) = dispatcher.dispatch(keys.clone()).unwrap();
    let mut results = Vec::new();
    while let Some(result) = stream.recv().await {
        tokio::time::sleep(Duration::from_millis(50)).await;
        results.push(result);
    }
    let drained_at = start.elapsed();

    assert_one_result_per_key(&results, &keys);
    assert_eq!(stream.received(), 12);
    assert_eq!(handle.await.unwrap().total, 12);
    // the consumer set the pace, not the 10ms fetches
    assert!(drained_at >= Duration::from_millis(12 * 50));
    assert_eq!(dispatcher.limiter().available(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stream_ends_only_after_the_last_result() {
    let dispatcher = Dispatcher::new(
        config(5),
        Arc::new(MockFetcher::new(vec![
            Duration::ZERO,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ])),
    )
    .unwrap();

    for round in 1..=20 {
        let keys = endpoints(round * 3);
        let (stream, handle) = dispatcher.dispatch(keys.clone()).unwrap();
        let results = collect_all(stream).await;

        assert_one_result_per_key(&results, &keys);
        assert_eq!(handle.await.unwrap().total, keys.len());
    }
    assert_eq!(dispatcher.limiter().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn aborting_the_batch_handle_keeps_every_result() {
    let dispatcher = Dispatcher::new(
        config(2),
        Arc::new(MockFetcher::new(vec![Duration::from_millis(100)])),
    )
    .unwrap();
    let keys = endpoints(6);

    let (stream, handle) = dispatcher.dispatch(keys.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    let results = collect_all(stream).await;

    assert_one_result_per_key(&results, &keys);
    assert!(results.iter().all(|r| r.outcome.is_success()));
    assert!(handle.await.unwrap_err().is_cancelled());
    assert_eq!(dispatcher.limiter().available(), 2);
    assert_eq!(dispatcher.limiter().in_flight(), 0);
}

#[tokio::test]
async fn retry_semantics_across_a_batch() {
    let fetcher = Arc::new(ScriptedFetcher::new([
        ("ok", Script::Succeed),
        ("flaky", Script::FailOnce),
        ("down", Script::AlwaysTransient),
        ("missing", Script::AlwaysPermanent),
    ]));
    let dispatcher = Dispatcher::new(config(2), fetcher.clone()).unwrap();

    let results = dispatcher
        .run(["ok", "flaky", "down", "missing"])
        .await
        .unwrap();
    let outcome_of = |key: &str| {
        results
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.outcome.clone())
            .unwrap()
    };

    assert!(outcome_of("ok").is_success());
    assert_eq!(fetcher.attempts("ok"), 1);

    assert_eq!(
        outcome_of("flaky"),
        Outcome::Success {
            payload: "flaky".into()
        }
    );
    assert_eq!(fetcher.attempts("flaky"), 2);

    match outcome_of("down") {
        Outcome::Failure { message } => {
            assert_eq!(message, "transient I/O failure: connection reset (attempt 2)")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(fetcher.attempts("down"), 2, "exactly one retry");

    assert_eq!(
        outcome_of("missing"),
        Outcome::Failure {
            message: "404 not found".into()
        }
    );
    assert_eq!(fetcher.attempts("missing"), 1, "permanent errors are not retried");
}

#[tokio::test]
async fn no_permits_leak_on_failure_paths() {
    let keys = endpoints(8);
    let scripts: Vec<(String, Script)> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let script = match i % 4 {
                0 => Script::Succeed,
                1 => Script::FailOnce,
                2 => Script::AlwaysTransient,
                _ => Script::AlwaysPermanent,
            };
            (k.clone(), script)
        })
        .collect();
    let dispatcher = Dispatcher::new(config(3), Arc::new(ScriptedFetcher::new(scripts))).unwrap();

    let (stream, handle) = dispatcher.dispatch(keys.clone()).unwrap();
    let results = collect_all(stream).await;
    let summary = handle.await.unwrap();

    assert_one_result_per_key(&results, &keys);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 4);
    assert_eq!(dispatcher.limiter().available(), 3);
    assert_eq!(dispatcher.limiter().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn consumer_renders_every_result() {
    let fetcher = MockFetcher::new(vec![Duration::from_millis(100), Duration::from_millis(300)])
        .with_permanent_failure("https://api.example.com/endpoint2", "404 not found");
    let dispatcher = Dispatcher::new(config(2), Arc::new(fetcher)).unwrap();

    let (stream, handle) = dispatcher.dispatch(endpoints(3)).unwrap();
    let mut consumer = Consumer::new(Vec::new()).without_timestamps();
    let drained = consumer.drain(stream).await.unwrap();
    let summary = handle.await.unwrap();

    let output = String::from_utf8(consumer.into_inner()).unwrap();
    let mut lines: Vec<&str> = output.lines().collect();
    lines.sort();

    assert_eq!(
        lines,
        vec![
            "Error from https://api.example.com/endpoint2: 404 not found",
            "Success from https://api.example.com/endpoint1: https://api.example.com/endpoint1",
            "Success from https://api.example.com/endpoint3: https://api.example.com/endpoint3",
        ]
    );
    assert_eq!(drained, summary);
}

#[tokio::test]
async fn fetch_timeout_turns_hangs_into_failures() {
    let dispatcher = Dispatcher::new(
        Config {
            max_concurrent_fetches: 2,
            fetch_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        },
        Arc::new(MockFetcher::new(vec![Duration::from_secs(60)])),
    )
    .unwrap();

    let results = dispatcher.run(["a", "b", "c"]).await.unwrap();

    assert_eq!(results.len(), 3);
    for result in &results {
        match &result.outcome {
            Outcome::Failure { message } => assert!(message.contains("timed out")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }
    assert_eq!(dispatcher.limiter().available(), 2);
}
