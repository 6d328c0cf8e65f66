//! Rate limiting for remote API calls
//!
//! Every remote list/get/copy/insert call issued by the copy engine first waits on a shared
//! [`RateLimiter`]. The limiter is a fixed-interval clock: a background task tops a semaphore
//! up to a single permit every `1s / ops_per_second`, so callers never accumulate burst credit
//! beyond one pending tick.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! # async fn example() {
//! // 20 remote calls per second, shared by every copy task
//! let limiter = Arc::new(throttle::RateLimiter::per_second(20));
//!
//! limiter.tick().await;
//! // issue the remote call here
//! # }
//! ```
//!
//! Tests substitute [`RateLimiter::unlimited`], which never waits.
//!
//! # Thread Safety
//!
//! The limiter is `Send + Sync` and is meant to be shared through an `Arc` across arbitrarily
//! deep recursion. Each caller independently waits for its own tick.

mod semaphore;

/// Operations per second used when nothing else is configured.
pub const DEFAULT_OPS_PER_SECOND: usize = 20;

#[derive(Debug)]
pub struct RateLimiter {
    sem: std::sync::Arc<semaphore::Semaphore>,
    interval: Option<std::time::Duration>,
    replenish: Option<tokio::task::JoinHandle<()>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `ops_per_second` calls per second, 0 means no limit.
    ///
    /// Must be called from within a tokio runtime since it spawns the replenish task.
    pub fn per_second(ops_per_second: usize) -> Self {
        if ops_per_second == 0 {
            return Self::unlimited();
        }
        let nanos = 1_000_000_000 / u64::try_from(ops_per_second).unwrap_or(u64::MAX);
        Self::with_interval(std::time::Duration::from_nanos(nanos.max(1)))
    }

    /// Creates a limiter that hands out one permit per `interval`.
    pub fn with_interval(interval: std::time::Duration) -> Self {
        let sem = std::sync::Arc::new(semaphore::Semaphore::new());
        sem.setup(1);
        let replenish = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.run_replenish_thread(1, interval).await })
        };
        tracing::debug!("rate limiter started, interval: {:?}", interval);
        Self {
            sem,
            interval: Some(interval),
            replenish: Some(replenish),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self {
            sem: std::sync::Arc::new(semaphore::Semaphore::new()),
            interval: None,
            replenish: None,
        }
    }

    pub fn interval(&self) -> Option<std::time::Duration> {
        self.interval
    }

    /// Waits for the next tick of the limiter clock.
    pub async fn tick(&self) {
        self.sem.consume().await;
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(replenish) = self.replenish.take() {
            replenish.abort();
        }
    }
}
