//! Fixed-size worker pool fed through bounded channels.
//!
//! Workers are plain OS threads draining a shared `async_channel` queue with
//! its blocking API. The queue holds `workers * 10` jobs; producers block when
//! it is full. Each batch gets its own bounded results channel and results are
//! returned in input order.

pub mod parallel;

pub use parallel::ParallelFileProcessor;

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_channel as channel;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::Cancelled;

/// Upper bound on worker threads regardless of configuration.
pub const MAX_WORKERS: usize = 8;

/// Queue slots per worker.
pub const QUEUE_FACTOR: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("worker pool is shut down")]
    Closed,

    #[error("workers did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// A unit of work producing `R`.
pub type Task<R> = Box<dyn FnOnce() -> R + Send + 'static>;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Number of workers actually started for a configured count.
pub fn effective_workers(configured: usize) -> usize {
    let cpus = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    configured.min(cpus).clamp(1, MAX_WORKERS)
}

#[derive(Debug)]
pub struct WorkerPool {
    queue: channel::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(configured: usize) -> Self {
        let size = effective_workers(configured);
        let (queue, jobs) = channel::bounded::<Job>(size * QUEUE_FACTOR);

        let workers = (0..size)
            .map(|id| {
                let jobs = jobs.clone();
                thread::Builder::new()
                    .name(format!("vaultlink-worker-{id}"))
                    .spawn(move || {
                        while let Ok(job) = jobs.recv_blocking() {
                            job();
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %e, "failed to spawn worker thread");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(workers = workers.len(), capacity = size * QUEUE_FACTOR, "worker pool started");
        Self { queue, size: workers.len().max(1), workers }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed() || self.workers.is_empty()
    }

    /// Run every task on the pool and return their results in input order.
    ///
    /// A panicking task yields `PoolError::TaskPanicked` without affecting the
    /// others. After shutdown every task yields `PoolError::Closed`.
    pub fn process_batch<R>(&self, tasks: Vec<Task<R>>) -> Vec<Result<R, PoolError>>
    where
        R: Send + 'static,
    {
        let total = tasks.len();
        let mut slots: Vec<Option<Result<R, PoolError>>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return Vec::new();
        }

        let (results_tx, results_rx) =
            channel::bounded::<(usize, Result<R, PoolError>)>(self.size * QUEUE_FACTOR);

        thread::scope(|scope| {
            let queue = &self.queue;
            let closed = self.workers.is_empty();
            scope.spawn(move || {
                for (index, task) in tasks.into_iter().enumerate() {
                    let tx = results_tx.clone();
                    let job: Job = Box::new(move || {
                        let result = catch_unwind(AssertUnwindSafe(task))
                            .map_err(|payload| PoolError::TaskPanicked(panic_message(&*payload)));
                        let _ = tx.send_blocking((index, result));
                    });
                    if closed || queue.send_blocking(job).is_err() {
                        let _ = results_tx.send_blocking((index, Err(PoolError::Closed)));
                    }
                }
            });

            for _ in 0..total {
                match results_rx.recv_blocking() {
                    Ok((index, result)) => slots[index] = Some(result),
                    Err(_) => break,
                }
            }
        });

        slots.into_iter().map(|slot| slot.unwrap_or(Err(PoolError::Closed))).collect()
    }

    /// Close the queue and wait for workers to drain it.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), PoolError> {
        self.queue.close();
        let deadline = Instant::now() + timeout;

        while self.workers.iter().any(|w| !w.is_finished()) {
            if Instant::now() >= deadline {
                warn!(?timeout, "worker pool shutdown timed out");
                return Err(PoolError::ShutdownTimeout(timeout));
            }
            thread::sleep(Duration::from_millis(5));
        }

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool stopped");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.close();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
