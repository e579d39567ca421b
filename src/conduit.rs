//! Result conduit: many worker tasks send, one consumer drains
//!
//! A bounded tokio mpsc channel. [`ResultSender`] is cloned into every worker
//! task; the dispatcher keeps the original and gives it up with
//! [`ResultSender::close`] once every worker has finished. The
//! [`ResultStream`] ends after that close and after the last worker clone is
//! gone, so it can never end while a result is still on its way.

use crate::error::{Error, Result};
use crate::types::FetchResult;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Create a conduit buffering at most `capacity` undelivered results
pub fn channel(capacity: usize) -> Result<(ResultSender, ResultStream)> {
    if capacity == 0 {
        return Err(Error::config(
            "result_buffer",
            "result conduit capacity must be at least 1",
        ));
    }

    let (tx, rx) = mpsc::channel(capacity);
    let sender = ResultSender {
        tx,
        sent: Arc::new(AtomicUsize::new(0)),
    };
    let stream = ResultStream {
        inner: ReceiverStream::new(rx),
        received: 0,
    };
    Ok((sender, stream))
}

/// Sending half of the conduit
#[derive(Clone, Debug)]
pub struct ResultSender {
    tx: mpsc::Sender<FetchResult>,
    sent: Arc<AtomicUsize>,
}

impl ResultSender {
    /// Enqueue a result, waiting while the buffer is full
    ///
    /// Fails with [`Error::ConduitClosed`] if the stream has been dropped.
    pub async fn send(&self, result: FetchResult) -> Result<()> {
        self.tx
            .send(result)
            .await
            .map_err(|_| Error::ConduitClosed)?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of results enqueued through this sender and its clones
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Returns true if the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Give up this handle
    ///
    /// Called once by the owner of the conduit after all producers are done.
    /// Taking `self` by value rules out a second close or a send after it.
    pub fn close(self) {
        tracing::debug!(sent = self.sent(), "Closing result conduit");
    }
}

/// Receiving half of the conduit
///
/// A lazy, finite stream of results; it cannot be restarted once it ends.
#[derive(Debug)]
pub struct ResultStream {
    inner: ReceiverStream<FetchResult>,
    received: usize,
}

impl ResultStream {
    /// Wait for the next result; `None` once the conduit is closed and drained
    pub async fn recv(&mut self) -> Option<FetchResult> {
        futures::StreamExt::next(self).await
    }

    /// Number of results yielded so far
    pub fn received(&self) -> usize {
        self.received
    }
}

impl Stream for ResultStream {
    type Item = FetchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(_)) = &polled {
            self.received += 1;
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
