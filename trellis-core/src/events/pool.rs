//! Background worker pool.
//!
//! Blocking handlers marked as background run on tokio's blocking threads.
//! A semaphore caps how many run at once so a burst of slow handlers cannot
//! grow the blocking pool without bound.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{panic_message, HandlerError};

/// Default number of concurrent background jobs.
pub const DEFAULT_WORKERS: usize = 4;

/// A fixed-size pool for blocking handler work.
#[derive(Debug, Clone)]
pub struct BackgroundPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BackgroundPool {
    /// Create a pool running at most `size` jobs at once. A size of zero is
    /// treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of jobs that could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a slot is free.
    pub async fn run<F, R>(&self, job: F) -> Result<R, HandlerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| HandlerError::PoolClosed)?;

        tokio::task::spawn_blocking(job).await.map_err(|err| {
            if err.is_panic() {
                HandlerError::Panicked(panic_message(err.into_panic()))
            } else {
                HandlerError::msg("background job was cancelled")
            }
        })
    }

    /// Stop accepting new jobs.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for BackgroundPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
