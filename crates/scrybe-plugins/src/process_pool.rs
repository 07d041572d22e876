//! Global process-count cap (§4.4 "A global cap bounds the number of
//! concurrent plugin processes and enforces deterministic teardown").
//! A semaphore permit stands in for one running plugin process; holding
//! the permit for the full lifetime of a call is what bounds the pool.

use std::sync::Arc;

use scrybe_types::ScrybeError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ProcessPool {
    semaphore: Arc<Semaphore>,
}

impl ProcessPool {
    pub fn new(max_concurrent_processes: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent_processes.max(1))) }
    }

    /// Acquire one process slot. The returned permit must be held for
    /// the entire lifetime of the spawned plugin process; dropping it
    /// (on success, timeout, or crash) is what returns the slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ScrybeError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScrybeError::DependencyUnavailable(format!("plugin process pool closed: {e}")))
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pool_bounds_concurrent_permits() {
        let pool = ProcessPool::new(2);
        assert_eq!(pool.available_permits(), 2);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.available_permits(), 0);
        drop(a);
        assert_eq!(pool.available_permits(), 1);
        drop(b);
    }
}
