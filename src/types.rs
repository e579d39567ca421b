//! Core types for fetch-fanout

use serde::{Deserialize, Serialize};

/// Opaque identifier of one unit of work (e.g. an endpoint address)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Create a new Key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal state of one worker task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation completed and produced a value
    Success {
        /// Value returned by the fetcher
        payload: String,
    },

    /// The operation could not produce a value
    Failure {
        /// Human-readable cause
        message: String,
    },
}

impl Outcome {
    /// Returns true for [`Outcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Returns true for [`Outcome::Failure`]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}

/// One `(Key, Outcome)` pair as delivered on the result conduit
///
/// Exactly one of these is produced per input key, however many attempts
/// the fetch took.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Key the outcome belongs to
    pub key: Key,
    /// What happened
    pub outcome: Outcome,
}

impl FetchResult {
    /// Build a successful result
    pub fn success(key: Key, payload: impl Into<String>) -> Self {
        Self {
            key,
            outcome: Outcome::Success {
                payload: payload.into(),
            },
        }
    }

    /// Build a failed result
    pub fn failure(key: Key, message: impl Into<String>) -> Self {
        Self {
            key,
            outcome: Outcome::Failure {
                message: message.into(),
            },
        }
    }
}

/// Counts for one finished batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of results produced (equals the number of input keys)
    pub total: usize,
    /// Results that ended in [`Outcome::Success`]
    pub succeeded: usize,
    /// Results that ended in [`Outcome::Failure`]
    pub failed: usize,
}

impl BatchSummary {
    /// Account for one result
    pub fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Success { .. } => self.succeeded += 1,
            Outcome::Failure { .. } => self.failed += 1,
        }
    }
}
