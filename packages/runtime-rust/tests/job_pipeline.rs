//! The ready transition end to end: registry, executors, ranked jobs, a
//! scheduled job registering recurring scoped work, and the locator handle.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chassis_core::{JobDescriptor, JobKind, SessionBackend};
use chassis_runtime::{
    run_ready_jobs, ExecutorManager, Job, JobContext, Registration, RegistryBuilder,
    ResourceContext, RuntimeConfig, ServiceRegistry, LOCATOR,
};
use parking_lot::Mutex;

use common::FakeBackend;

/// Scoped store driven by the recurring refresh task.
struct RefreshStore {
    backend: Arc<FakeBackend>,
}

impl RefreshStore {
    async fn refresh(&self) -> anyhow::Result<()> {
        self.backend.write("refreshed");
        Ok(())
    }
}

/// Startup job that records its own run for order assertions.
struct OrderedJob {
    descriptor: JobDescriptor,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

#[async_trait]
impl Job for OrderedJob {
    fn descriptor(&self) -> JobDescriptor {
        self.descriptor
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<()> {
        self.log.lock().push(self.descriptor.name);
        // Deferred work goes through the shared pool, like real startup
        // jobs; its completion is order-independent.
        ctx.executors.pool().execute(async {}).await?;
        if self.fail {
            anyhow::bail!("seed data unavailable");
        }
        Ok(())
    }
}

/// Scheduled job: its single invocation registers the recurring refresh
/// task on the shared scheduler.
struct RefreshJob;

#[async_trait]
impl Job for RefreshJob {
    fn descriptor(&self) -> JobDescriptor {
        JobDescriptor::scheduled(
            "refresh",
            10,
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let JobKind::Scheduled {
            initial_delay,
            period,
        } = self.descriptor().kind
        else {
            anyhow::bail!("refresh job must carry scheduled timing");
        };
        let registry = Arc::clone(&ctx.registry);
        ctx.executors
            .scheduler()
            .schedule_repeating("refresh", initial_delay, period, move || {
                let registry = Arc::clone(&registry);
                async move {
                    let Ok(binding) = registry.method::<RefreshStore>("refresh") else {
                        return;
                    };
                    let Ok(store) = registry.resolve::<RefreshStore>() else {
                        return;
                    };
                    let mut ctx = ResourceContext::new();
                    let _ = binding
                        .invoke::<(), _>(&mut ctx, move |_ctx| {
                            Box::pin(async move { store.refresh().await })
                        })
                        .await;
                }
            })?;
        Ok(())
    }
}

fn ordered_job(
    name: &'static str,
    priority: i32,
    log: &Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
) -> Registration<OrderedJob> {
    let log = Arc::clone(log);
    Registration::new(move |_| {
        Ok(Arc::new(OrderedJob {
            descriptor: JobDescriptor::startup(name, priority),
            log: Arc::clone(&log),
            fail,
        }))
    })
    .priority(priority)
    .contract::<dyn Job>(|job| job)
}

fn wired(backend: &Arc<FakeBackend>, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<ServiceRegistry> {
    let store_backend = Arc::clone(backend);
    Arc::new(
        RegistryBuilder::new(Arc::clone(backend) as Arc<dyn SessionBackend>)
            .register(
                Registration::new(move |_| {
                    Ok(Arc::new(RefreshStore {
                        backend: Arc::clone(&store_backend),
                    }))
                })
                .operation_in_unit_of_work("refresh"),
            )
            .register(ordered_job("report", 5, log, false))
            .register(ordered_job("seed", 1, log, false))
            .register(ordered_job("broken", 2, log, true))
            .register(Registration::new(|_| Ok(Arc::new(RefreshJob))).contract::<dyn Job>(|job| job))
            .build()
            .expect("registry builds"),
    )
}

#[tokio::test(start_paused = true)]
async fn ready_transition_runs_jobs_in_order_and_schedules_refreshes() {
    common::init_tracing();
    let backend = FakeBackend::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = wired(&backend, &log);
    let executors = Arc::new(ExecutorManager::new(RuntimeConfig {
        worker_count: 2,
        queue_capacity: 8,
        shutdown_grace_ms: 1000,
    }));
    executors.start();

    run_ready_jobs(Arc::clone(&registry), Arc::clone(&executors))
        .await
        .expect("job sweep runs");
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Priority order, and the failing job did not stop the sweep.
    assert_eq!(*log.lock(), vec!["seed", "broken", "report"]);

    // The refresh task fires at the initial delay, then every period.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    tokio::task::yield_now().await;
    assert_eq!(backend.committed_rows(), vec!["refreshed"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    tokio::task::yield_now().await;
    assert_eq!(backend.committed_rows().len(), 2);
    assert_eq!(backend.counters.commits.load(Ordering::Relaxed), 2);

    // Stop halts the recurrence; double stop is a no-op.
    executors.stop().await;
    let settled = backend.committed_rows().len();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(backend.committed_rows().len(), settled);
    executors.stop().await;
}

#[tokio::test]
async fn locator_publishes_the_registry_process_wide() {
    let backend = FakeBackend::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = wired(&backend, &log);

    assert!(LOCATOR.set(Arc::clone(&registry)));
    // Later publications lose; the first registry stays.
    assert!(!LOCATOR.set(wired(&backend, &log)));
    assert!(Arc::ptr_eq(&LOCATOR.get().unwrap(), &registry));

    let jobs = LOCATOR.find::<dyn Job>().expect("jobs are bound");
    assert_eq!(jobs.descriptor().name, "seed");
    assert!(LOCATOR.require::<dyn Job>().is_ok());
    assert!(LOCATOR.find::<RefreshStore>().is_some());
}
