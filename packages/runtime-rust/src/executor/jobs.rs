//! Ranked jobs run at the ready transition.
//!
//! Jobs are ordinary registry services bound to the `dyn Job` contract. Each
//! is invoked exactly once, in priority order; scheduled jobs use their one
//! invocation to register recurring tasks on the scheduler. Failures are
//! logged and never stop the sweep.

use std::sync::Arc;

use async_trait::async_trait;
use chassis_core::{precedence_key, JobDescriptor};
use tracing::{error, info};

use crate::error::RegistryError;
use crate::executor::ExecutorManager;
use crate::registry::ServiceRegistry;

/// A unit of ranked work. No arguments, no return value; effects happen
/// through the services and executors reachable from the context.
#[async_trait]
pub trait Job: Send + Sync {
    fn descriptor(&self) -> JobDescriptor;
    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<()>;
}

/// Everything a job may need, passed explicitly instead of reached through
/// a global.
pub struct JobContext {
    pub registry: Arc<ServiceRegistry>,
    pub executors: Arc<ExecutorManager>,
}

/// Runs a fixed set of jobs once, in priority order.
pub struct JobExecutor {
    jobs: Vec<Arc<dyn Job>>,
}

impl JobExecutor {
    #[must_use]
    pub fn new(jobs: Vec<Arc<dyn Job>>) -> Self {
        Self { jobs }
    }

    /// Collects every service bound to the `dyn Job` contract. A registry
    /// with no jobs yields an empty executor.
    ///
    /// # Errors
    ///
    /// `Instantiation` when a per-resolve job factory fails.
    pub fn from_registry(registry: &ServiceRegistry) -> Result<Self, RegistryError> {
        Ok(Self::new(registry.resolve_all::<dyn Job>()?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Invokes every job once, ordered by the same priority inversion that
    /// orders contract bindings. A failing job is logged and the sweep
    /// continues with the remaining jobs.
    pub async fn run_ready(&self, ctx: &JobContext) {
        let mut jobs = self.jobs.clone();
        jobs.sort_by_key(|job| {
            let descriptor = job.descriptor();
            precedence_key(descriptor.priority, descriptor.name)
        });
        for job in jobs {
            let descriptor = job.descriptor();
            info!(job = descriptor.name, kind = ?descriptor.kind, "running job");
            if let Err(err) = job.execute(ctx).await {
                error!(
                    job = descriptor.name,
                    error = format!("{err:#}"),
                    "job failed; continuing with the remaining jobs"
                );
            }
        }
    }
}

/// The whole ready transition in one call: collect the registered jobs and
/// run them against a fresh context.
///
/// # Errors
///
/// `Instantiation` when a per-resolve job factory fails; individual job
/// failures are logged, not returned.
pub async fn run_ready_jobs(
    registry: Arc<ServiceRegistry>,
    executors: Arc<ExecutorManager>,
) -> Result<(), RegistryError> {
    let executor = JobExecutor::from_registry(&registry)?;
    let ctx = JobContext {
        registry,
        executors,
    };
    executor.run_ready(&ctx).await;
    Ok(())
}
