//! Configuration types for fetch-fanout

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a [`Dispatcher`](crate::dispatcher::Dispatcher)
///
/// Every field has a default, so an empty JSON object is a valid config:
///
/// ```
/// use fetch_fanout::Config;
///
/// let config: Config = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.max_concurrent_fetches, 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of fetches holding a limiter permit at once (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Buffer size of the result conduit (default: 1)
    ///
    /// With a buffer of 1 a worker's send completes only once the consumer
    /// has taken the previous result, which is as close to a rendezvous
    /// hand-off as a tokio channel gets.
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Per-attempt fetch timeout (None = wait indefinitely)
    ///
    /// An attempt that runs past the timeout counts as a transient failure
    /// and is retried once.
    #[serde(default, with = "optional_duration_millis")]
    pub fetch_timeout: Option<Duration>,

    /// Simulated fetch behaviour used by [`MockFetcher`](crate::fetcher::MockFetcher)
    #[serde(default)]
    pub mock: MockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent(),
            result_buffer: default_result_buffer(),
            fetch_timeout: None,
            mock: MockConfig::default(),
        }
    }
}

impl Config {
    /// Check the settings that would otherwise deadlock or panic at runtime
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(Error::config(
                "max_concurrent_fetches",
                "max_concurrent_fetches must be at least 1",
            ));
        }
        if self.result_buffer == 0 {
            return Err(Error::config(
                "result_buffer",
                "result_buffer must be at least 1",
            ));
        }
        if self.fetch_timeout == Some(Duration::ZERO) {
            return Err(Error::config(
                "fetch_timeout",
                "fetch_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Simulated latency for the mock fetcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Candidate latencies; each fetch sleeps for one picked at random
    /// (default: 1000, 2000 and 3000 ms)
    #[serde(default = "default_latencies", with = "duration_millis_vec")]
    pub latencies: Vec<Duration>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latencies: default_latencies(),
        }
    }
}

impl MockConfig {
    /// Check that the mock has something to pick from
    ///
    /// Only a mock-backed dispatcher reads this section, so [`Config::validate`]
    /// leaves it alone.
    pub fn validate(&self) -> Result<()> {
        if self.latencies.is_empty() {
            return Err(Error::config(
                "mock.latencies",
                "at least one mock latency is required",
            ));
        }
        Ok(())
    }
}

fn default_max_concurrent() -> usize {
    2
}

fn default_result_buffer() -> usize {
    1
}

fn default_latencies() -> Vec<Duration> {
    vec![
        Duration::from_millis(1000),
        Duration::from_millis(2000),
        Duration::from_millis(3000),
    ]
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

// Vec<Duration> serialization helper (milliseconds)
mod duration_millis_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(durations.iter().map(|d| d.as_millis() as u64))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}
