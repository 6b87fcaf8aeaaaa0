//! Bounded background execution
//!
//! Alignment runs execute off the request path: submission always succeeds
//! immediately (the request returns its acceptance response), and the job
//! body waits for one of a fixed number of permits before running. Pair
//! processing within a job is sequential; the pool only bounds how many
//! sessions run at once.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fixed-capacity pool for pipeline runs.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submit a job. Returns immediately; the job body starts once a
    /// permit frees up.
    pub fn submit<F>(&self, job: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Pool closed during shutdown; drop the job.
                return;
            };
            debug!("Worker permit acquired");
            job.await;
        })
    }
}
