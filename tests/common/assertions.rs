//! Custom assertions for batch results

use fetch_fanout::{FetchResult, ResultStream};
use std::collections::HashMap;

/// Drain a stream to the end
pub async fn collect_all(mut stream: ResultStream) -> Vec<FetchResult> {
    let mut results = Vec::new();
    while let Some(result) = stream.recv().await {
        results.push(result);
    }
    results
}

/// Assert that `results` holds exactly one entry per key in `keys`, in any order
pub fn assert_one_result_per_key(results: &[FetchResult], keys: &[String]) {
    assert_eq!(
        results.len(),
        keys.len(),
        "expected {} results, got {}",
        keys.len(),
        results.len()
    );

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for result in results {
        *seen.entry(result.key.as_str()).or_insert(0) += 1;
    }
    for key in keys {
        assert_eq!(
            seen.get(key.as_str()).copied(),
            Some(1),
            "key {key} should have exactly one result"
        );
    }
}
