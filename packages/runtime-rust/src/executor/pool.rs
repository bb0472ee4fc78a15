//! The general task pool: a fixed set of workers draining a bounded queue.
//!
//! Backpressure is caller-runs: when the queue is full the submitting task
//! executes the work inline. Nothing is dropped and nothing is unbounded.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::ExecutorError;

type Task = BoxFuture<'static, ()>;

struct PoolInner {
    queue: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

/// Bounded worker pool for fire-and-forget tasks.
pub struct TaskPool {
    name: &'static str,
    worker_count: usize,
    queue_capacity: usize,
    inner: RwLock<Option<PoolInner>>,
    submitted: AtomicU64,
    completed: Arc<AtomicU64>,
    caller_runs: AtomicU64,
}

impl TaskPool {
    #[must_use]
    pub fn new(name: &'static str, worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            name,
            worker_count: worker_count.max(1),
            queue_capacity: queue_capacity.max(1),
            inner: RwLock::new(None),
            submitted: AtomicU64::new(0),
            completed: Arc::new(AtomicU64::new(0)),
            caller_runs: AtomicU64::new(0),
        }
    }

    /// Spawns the workers. Calling `start` on a running pool is a no-op.
    pub fn start(&self) {
        let mut slot = self.inner.write();
        if slot.is_some() {
            return;
        }
        let (queue, receiver) = mpsc::channel::<Task>(self.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let workers = (0..self.worker_count)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let completed = Arc::clone(&self.completed);
                tokio::spawn(
                    async move {
                        loop {
                            let task = { receiver.lock().await.recv().await };
                            match task {
                                Some(task) => {
                                    task.await;
                                    completed.fetch_add(1, Ordering::Relaxed);
                                }
                                None => break,
                            }
                        }
                    }
                    .instrument(info_span!("pool_worker", pool = self.name, index)),
                )
            })
            .collect();
        *slot = Some(PoolInner { queue, workers });
        debug!(
            pool = self.name,
            workers = self.worker_count,
            queue_capacity = self.queue_capacity,
            "task pool started"
        );
    }

    /// Submits a task. On a full queue the task runs inline on the caller
    /// before this returns.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start` or after `stop`; `ShuttingDown` when the
    /// submission races a concurrent `stop`.
    pub async fn execute<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = {
            let guard = self.inner.read();
            let inner = guard.as_ref().ok_or(ExecutorError::NotStarted)?;
            inner.queue.clone()
        };
        self.submitted.fetch_add(1, Ordering::Relaxed);
        match queue.try_send(Box::pin(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                debug!(pool = self.name, "queue full; running task on the submitter");
                self.caller_runs.fetch_add(1, Ordering::Relaxed);
                task.await;
                self.completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ExecutorError::ShuttingDown),
        }
    }

    /// Closes the queue, waits up to `grace` for the workers to drain it,
    /// then aborts whatever is still running. Idempotent.
    pub async fn stop(&self, grace: Duration) {
        let inner = self.inner.write().take();
        let Some(PoolInner { queue, mut workers }) = inner else {
            return;
        };
        drop(queue);
        let drained = tokio::time::timeout(grace, async {
            for worker in &mut workers {
                let _ = worker.await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(pool = self.name, "grace period elapsed; aborting remaining workers");
            // Aborting an already finished worker is a no-op.
            for worker in &workers {
                worker.abort();
            }
        }
        debug!(pool = self.name, "task pool stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Point-in-time counters for diagnostics.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let queued = self
            .inner
            .read()
            .as_ref()
            .map_or(0, |inner| self.queue_capacity - inner.queue.capacity());
        PoolStatus {
            name: self.name,
            running: self.is_running(),
            workers: self.worker_count,
            queued,
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one pool's counters.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub name: &'static str,
    pub running: bool,
    pub workers: usize,
    pub queued: usize,
    pub submitted: u64,
    pub completed: u64,
    pub caller_runs: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn execute_before_start_fails() {
        let pool = TaskPool::new("test", 2, 4);
        let err = pool.execute(async {}).await.unwrap_err();
        assert!(matches!(err, ExecutorError::NotStarted));
    }

    #[tokio::test]
    async fn workers_run_submitted_tasks() {
        let pool = TaskPool::new("test", 2, 4);
        pool.start();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.execute(async move {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .await
            .unwrap();
        }
        pool.stop(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 8);
        assert_eq!(pool.status().completed, 8);
    }

    #[tokio::test]
    async fn full_queue_runs_the_task_on_the_submitter() {
        let pool = TaskPool::new("test", 1, 1);
        pool.start();
        let gate = Arc::new(Notify::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        // Occupy the single worker.
        let hold = Arc::clone(&gate);
        pool.execute(async move {
            let _ = started_tx.send(());
            hold.notified().await;
        })
        .await
        .unwrap();
        // The worker owns the task now, so the queue is empty again.
        started_rx.await.unwrap();

        // Occupy the single queue slot.
        let queued_runs = Arc::new(AtomicU32::new(0));
        let queued_flag = Arc::clone(&queued_runs);
        pool.execute(async move {
            queued_flag.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();

        // This submission finds the queue full and must run inline.
        let inline_runs = Arc::new(AtomicU32::new(0));
        let inline_flag = Arc::clone(&inline_runs);
        pool.execute(async move {
            inline_flag.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();
        assert_eq!(inline_runs.load(Ordering::Relaxed), 1);
        assert_eq!(queued_runs.load(Ordering::Relaxed), 0);
        assert_eq!(pool.status().caller_runs, 1);

        gate.notify_one();
        pool.stop(Duration::from_secs(5)).await;
        assert_eq!(queued_runs.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stop_aborts_work_that_outlives_the_grace_period() {
        let pool = TaskPool::new("test", 1, 4);
        pool.start();
        pool.execute(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
        .await
        .unwrap();
        tokio::task::yield_now().await;
        pool.stop(Duration::from_millis(50)).await;
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn stop_twice_is_safe_and_execute_afterwards_fails() {
        let pool = TaskPool::new("test", 1, 4);
        pool.start();
        pool.stop(Duration::from_secs(1)).await;
        pool.stop(Duration::from_secs(1)).await;
        let err = pool.execute(async {}).await.unwrap_err();
        assert!(matches!(err, ExecutorError::NotStarted));
    }
}
