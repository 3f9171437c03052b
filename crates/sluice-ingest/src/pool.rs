//! Bounded execution of blocking and CPU-heavy work.

use crate::error::{IngestError, IngestResult};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// `spawn_blocking` gated by a fixed number of permits.
///
/// The permit moves into the blocking closure, so work that outlives its
/// caller (a timed-out file) keeps its slot until it really finishes.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl BlockingPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, f: F) -> IngestResult<T>
    where
        F: FnOnce() -> IngestResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::ProcessingError("blocking pool closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| IngestError::ProcessingError(format!("blocking task failed: {}", e)))?
    }
}

/// `spawn_blocking` without a CPU slot, for store calls.
pub async fn run_unbounded<F, T>(f: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::ProcessingError(format!("blocking task failed: {}", e)))?
}
