//! Scheduler — a pool of timed executors that re-arm worker ticks
//! after a chosen delay, with graceful/forced shutdown and atomic
//! replacement for the reseek protocol.
//!
//! Modeled on `tokio::task::JoinSet` + `tokio_util::sync::CancellationToken`,
//! with a `tokio::sync::Semaphore` sized `fetch_threads` bounding how many
//! ticks may *execute* concurrently (a tick whose delay has elapsed still
//! waits on this semaphore before running, keeping "at most N concurrently
//! running ticks" true regardless of how many are currently scheduled).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerClosed;

/// A pool of cooperative timed workers. One instance backs one "generation"
/// of partition ticks; `replace()` on the owning façade swaps in a fresh
/// instance so stale ticks from before a reseek can never run.
pub struct Scheduler {
    tasks: std::sync::Mutex<JoinSet<()>>,
    cancel: CancellationToken,
    concurrency: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(fetch_threads: usize) -> Self {
        Self {
            tasks: std::sync::Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
            concurrency: Arc::new(Semaphore::new(fetch_threads.max(1))),
        }
    }

    /// Submits `task` to run after `delay`. Rejected (benignly) once this
    /// scheduler has begun shutting down.
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> Result<(), SchedulerClosed>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(SchedulerClosed);
        }
        let cancel = self.cancel.clone();
        let concurrency = self.concurrency.clone();
        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let permit = tokio::select! {
                        _ = cancel.cancelled() => return,
                        p = concurrency.acquire() => p,
                    };
                    if let Ok(permit) = permit {
                        task().await;
                        drop(permit);
                    }
                }
            }
        });
        Ok(())
    }

    /// Stop accepting new submissions and let in-flight ticks finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop accepting new submissions and abort every in-flight tick
    /// immediately.
    pub fn force_shutdown(&self) {
        self.cancel.cancel();
        self.tasks.lock().expect("scheduler mutex poisoned").abort_all();
    }

    /// Waits up to `timeout` for all scheduled/in-flight ticks to finish
    /// after a graceful `shutdown()`, then forces the rest.
    pub async fn await_termination(&self, timeout: Duration) {
        self.shutdown();
        let drain = async {
            loop {
                let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
                if tasks.is_empty() {
                    return;
                }
                // join_next needs the lock released across the await point.
                drop(tasks);
                let joined = {
                    let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
                    tasks.try_join_next()
                };
                match joined {
                    Some(Ok(())) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "scheduler task panicked during drain");
                        continue;
                    }
                    None => tokio::time::sleep(Duration::from_millis(5)).await,
                }
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            self.force_shutdown();
        }
    }
}
