//! Bounded concurrency limiter shared by the query orchestrator (§4.2) and
//! the correlation engine's per-cluster worker pool (§4.8).
//!
//! Tasks are submitted as boxed futures ahead of time; `run_all` launches
//! them sequentially with an inter-launch delay, gated by a semaphore so at
//! most `max_concurrency` run at once. The first `Err` among all tasks is
//! returned from `run_all`, but every task is still awaited to completion —
//! a failing chunk request must not leave sibling chunks half-written.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{AlertMagnetError, Result};

type BoxTask = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Opaque handle to a submitted task. Currently only useful for counting;
/// kept distinct from a bare index so callers don't depend on ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(usize);

pub struct Limiter {
    max_concurrency: usize,
    delay: Duration,
    tasks: Mutex<Vec<BoxTask>>,
    started: AtomicBool,
}

impl Limiter {
    pub fn new(max_concurrency: usize, delay: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            delay,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Queue a task for execution. Rejected once `run_all` has started.
    pub fn submit<F>(&self, task: F) -> Result<TaskHandle>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.started.load(Ordering::SeqCst) {
            return Err(AlertMagnetError::InvalidQueryQueue(
                "submit() called after run_all() has started".to_string(),
            ));
        }
        let mut tasks = self.tasks.lock().expect("limiter mutex poisoned");
        let handle = TaskHandle(tasks.len());
        tasks.push(Box::pin(task));
        Ok(handle)
    }

    /// Launch every submitted task, capped at `max_concurrency` in flight,
    /// staggering launches by `delay`. Blocks until all tasks finish and
    /// returns the first error encountered, if any.
    pub async fn run_all(&self) -> Result<()> {
        self.run_all_cancellable(None).await
    }

    /// Like `run_all`, but a cancelled token aborts further launches while
    /// still awaiting tasks already in flight.
    pub async fn run_all_cancellable(&self, cancel: Option<CancellationToken>) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        let pending = std::mem::take(&mut *self.tasks.lock().expect("limiter mutex poisoned"));

        let semaphore = std::sync::Arc::new(Semaphore::new(self.max_concurrency));
        let mut set: JoinSet<Result<()>> = JoinSet::new();
        let mut first_launch = true;

        for task in pending {
            if let Some(token) = &cancel
                && token.is_cancelled()
            {
                break;
            }

            if !first_launch && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            first_launch = false;

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");

            set.spawn(async move {
                let result = task.await;
                drop(permit);
                result
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let task_result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(AlertMagnetError::Other(format!(
                    "task panicked: {join_err}"
                ))),
            };
            if let Err(e) = task_result
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.lock().expect("limiter mutex poisoned").len()
    }
}
