//! Drains a result stream and renders one line per result

use crate::error::Result;
use crate::types::{BatchSummary, FetchResult, Outcome};
use futures::{Stream, StreamExt};
use std::io::Write;

/// Timestamp layout used for rendered lines (local time, millisecond precision)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Render a result without timestamp
///
/// ```
/// use fetch_fanout::{FetchResult, Key, consumer::render_line};
///
/// let ok = FetchResult::success(Key::from("https://api.example.com/endpoint1"), "hello");
/// assert_eq!(render_line(&ok), "Success from https://api.example.com/endpoint1: hello");
///
/// let err = FetchResult::failure(Key::from("https://api.example.com/endpoint2"), "reset");
/// assert_eq!(render_line(&err), "Error from https://api.example.com/endpoint2: reset");
/// ```
pub fn render_line(result: &FetchResult) -> String {
    match &result.outcome {
        Outcome::Success { payload } => format!("Success from {}: {}", result.key, payload),
        Outcome::Failure { message } => format!("Error from {}: {}", result.key, message),
    }
}

/// Writes every result it drains to `out`
///
/// Holds no state between results apart from the running counts.
#[derive(Debug)]
pub struct Consumer<W> {
    out: W,
    timestamps: bool,
}

impl<W: Write> Consumer<W> {
    /// Create a consumer that prefixes each line with the local wall-clock time
    pub fn new(out: W) -> Self {
        Self {
            out,
            timestamps: true,
        }
    }

    /// Drop the timestamp prefix (useful for deterministic output)
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Drain `stream` until it ends, writing one line per result
    ///
    /// Returns the counts observed. Stops early only if writing fails.
    pub async fn drain<S>(&mut self, mut stream: S) -> Result<BatchSummary>
    where
        S: Stream<Item = FetchResult> + Unpin,
    {
        let mut summary = BatchSummary::default();
        while let Some(result) = stream.next().await {
            self.write_result(&result)?;
            summary.record(&result.outcome);
        }
        self.out.flush()?;
        Ok(summary)
    }

    /// Write a single rendered result
    pub fn write_result(&mut self, result: &FetchResult) -> Result<()> {
        let line = render_line(result);
        if self.timestamps {
            let now = chrono::Local::now().format(TIMESTAMP_FORMAT);
            writeln!(self.out, "{now} {line}")?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
