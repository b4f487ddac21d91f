//! Per-file fan-out over the worker pool.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{PoolError, Task, WorkerPool, panic_message};
use crate::cancel::CancelToken;

/// Applies a function to a batch of items, in parallel when the batch is
/// large enough to pay for the hand-off.
///
/// The cancellation token is checked before each item starts. Items already
/// running are never interrupted.
#[derive(Debug)]
pub struct ParallelFileProcessor {
    pool: WorkerPool,
    cancel: CancelToken,
}

impl ParallelFileProcessor {
    pub fn new(workers: usize, cancel: CancelToken) -> Self {
        Self { pool: WorkerPool::new(workers), cancel }
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Process `items` with `f`, returning one result per item in input order.
    pub fn process<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Result<R, PoolError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if items.len() < 2 * self.workers() {
            debug!(items = items.len(), "processing sequentially");
            return items
                .into_iter()
                .map(|item| {
                    self.cancel.check()?;
                    catch_unwind(AssertUnwindSafe(|| f(item)))
                        .map_err(|payload| PoolError::TaskPanicked(panic_message(&*payload)))
                })
                .collect();
        }

        debug!(items = items.len(), workers = self.workers(), "processing on worker pool");
        let f = Arc::new(f);
        let tasks: Vec<Task<Result<R, PoolError>>> = items
            .into_iter()
            .map(|item| {
                let f = Arc::clone(&f);
                let cancel = self.cancel.clone();
                Box::new(move || {
                    cancel.check()?;
                    Ok(f(item))
                }) as Task<Result<R, PoolError>>
            })
            .collect();

        self.pool.process_batch(tasks).into_iter().map(|r| r.and_then(|inner| inner)).collect()
    }

    pub fn shutdown(mut self, timeout: Duration) -> Result<(), PoolError> {
        self.pool.shutdown(timeout)
    }
}
