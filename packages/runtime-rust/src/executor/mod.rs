//! Job execution: the general task pool, the scheduler, and the manager
//! that owns their shared lifecycle.

pub mod jobs;
pub mod pool;
pub mod scheduler;

use std::time::Duration;

use tracing::info;

use crate::config::RuntimeConfig;

pub use jobs::{run_ready_jobs, Job, JobContext, JobExecutor};
pub use pool::{PoolStatus, TaskPool};
pub use scheduler::Scheduler;

/// Owns the general pool and the scheduler and sequences their lifecycle.
pub struct ExecutorManager {
    pool: TaskPool,
    scheduler: Scheduler,
    shutdown_grace: Duration,
}

impl ExecutorManager {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            pool: TaskPool::new("general", config.worker_count, config.queue_capacity),
            scheduler: Scheduler::new(),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Starts the pool workers and opens the scheduler for work. Neither
    /// accepts work before this.
    pub fn start(&self) {
        self.pool.start();
        self.scheduler.start();
        info!("executors started");
    }

    /// Stops the scheduler first so recurring tasks cannot enqueue work
    /// while the pool drains, then stops the pool. Each side gets the full
    /// grace period. Idempotent.
    pub async fn stop(&self) {
        self.scheduler.stop(self.shutdown_grace).await;
        self.pool.stop(self.shutdown_grace).await;
        info!("executors stopped");
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }
}
