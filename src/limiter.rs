//! Counting admission gate for in-flight fetches
//!
//! The [`Limiter`] wraps a tokio [`Semaphore`] and keeps its own view of how
//! many permits are out, so tests and callers can check the concurrency
//! bound and spot leaked permits after a batch.
//!
//! Permits are scoped: [`Limiter::acquire`] hands out a [`LimiterPermit`]
//! that returns itself to the gate when released or dropped, including on
//! early returns and panics inside the holder. A permit can only come from
//! `acquire`, so releasing without acquiring cannot be expressed.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded admission gate shared by all worker tasks of a dispatcher
///
/// Cloning is cheap and clones share the same permits.
#[derive(Clone, Debug)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

#[derive(Debug)]
struct Counters {
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Limiter {
    /// Create a limiter that admits at most `capacity` holders at once
    ///
    /// # Examples
    ///
    /// ```
    /// use fetch_fanout::Limiter;
    ///
    /// let limiter = Limiter::new(2).unwrap();
    /// assert_eq!(limiter.available(), 2);
    ///
    /// assert!(Limiter::new(0).is_err());
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config(
                "max_concurrent_fetches",
                "limiter capacity must be at least 1",
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(Error::config(
                "max_concurrent_fetches",
                format!(
                    "limiter capacity {capacity} exceeds the maximum of {}",
                    Semaphore::MAX_PERMITS
                ),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(Counters {
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        })
    }

    /// Wait until fewer than `capacity` permits are held, then take one
    ///
    /// Fails only with [`Error::LimiterClosed`] once [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<LimiterPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::LimiterClosed)?;

        let held = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(
            held <= self.counters.capacity,
            "limiter admitted {held} holders with capacity {}",
            self.counters.capacity
        );
        self.counters.peak.fetch_max(held, Ordering::SeqCst);

        tracing::trace!(in_flight = held, capacity = self.counters.capacity, "Permit acquired");

        Ok(LimiterPermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Stop granting permits; pending and future `acquire` calls fail
    ///
    /// Permits already handed out stay valid until released.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns true once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Configured maximum number of concurrent holders
    pub fn capacity(&self) -> usize {
        self.counters.capacity
    }

    /// Permits that could be granted right now without waiting
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

/// A granted limiter permit
///
/// Returned to the limiter on [`release`](Self::release) or drop.
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl LimiterPermit {
    /// Return the permit to the limiter
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is dropped, so the count is
        // already lowered by the time the next waiter is admitted.
        let previous = self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        assert!(previous > 0, "limiter released more permits than it granted");
        tracing::trace!(in_flight = previous - 1, "Permit released");
    }
}
