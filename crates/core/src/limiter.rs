//! Counting permit pool bounding concurrent transfers
//!
//! Built on `tokio::sync::Semaphore`, whose waiters are served in FIFO
//! order. A `Permit` gives its capacity back when dropped, so every exit
//! path of a transfer (success, error, panic unwinding) releases it.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Fixed-capacity pool of transfer permits
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of concurrency capacity
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

impl Permit {
    /// Return this permit to its pool
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// Create a pool with `capacity` permits (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Wait until a permit is free and take it
    pub async fn acquire(&self) -> Result<Permit> {
        let inner = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Io(std::io::Error::other("concurrency limiter closed")))?;
        Ok(Permit { _inner: inner })
    }

    /// Take a permit if one is free right now
    pub fn try_acquire(&self) -> Option<Permit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|inner| Permit { _inner: inner })
    }
}
