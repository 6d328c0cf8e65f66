use std::sync::atomic::{AtomicBool, Ordering};

/// Token bucket backed by a tokio semaphore.
///
/// When disabled every `consume` returns immediately.
#[derive(Debug)]
pub struct Semaphore {
    enabled: AtomicBool,
    sem: tokio::sync::Semaphore,
}

impl Semaphore {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            sem: tokio::sync::Semaphore::const_new(0),
        }
    }

    pub fn setup(&self, value: usize) {
        self.enabled.store(value > 0, Ordering::Release);
        if value == 0 {
            return;
        }
        self.sem.forget_permits(self.sem.available_permits());
        self.sem.add_permits(value);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub async fn consume(&self) {
        if !self.is_enabled() {
            return;
        }
        // the semaphore is owned by self and never closed
        if let Ok(permit) = self.sem.acquire().await {
            permit.forget();
        }
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Tops the bucket up to `capacity` every `interval`, never above it.
    pub async fn run_replenish_thread(&self, capacity: usize, interval: std::time::Duration) {
        if !self.is_enabled() {
            return;
        }
        loop {
            tokio::time::sleep(interval).await;
            let curr_permits = self.sem.available_permits();
            if curr_permits >= capacity {
                continue;
            }
            self.sem.add_permits(capacity - curr_permits);
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
