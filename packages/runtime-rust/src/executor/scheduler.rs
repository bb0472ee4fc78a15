//! The scheduler: named, shutdown-aware timer tasks.
//!
//! Every scheduled task runs a select loop over its timer and a shared
//! shutdown signal, so `stop` interrupts sleeps instead of waiting them out.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::ExecutorError;

/// Registry of named delayed and repeating tasks.
///
/// Like the task pool, the scheduler accepts work only between `start` and
/// `stop`.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: DashMap<String, JoinHandle<()>>,
    started: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: DashMap::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Opens the scheduler for work. Idempotent.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Runs `task` once after `delay`, unless shutdown arrives first.
    /// Scheduling under a name that is already taken replaces the old task.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start` or after `stop`.
    pub fn schedule_once<F>(
        &self,
        name: impl Into<String>,
        delay: Duration,
        task: F,
    ) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.started.load(Ordering::Acquire) {
            return Err(ExecutorError::NotStarted);
        }
        let name = name.into();
        let mut shutdown = self.shutdown.subscribe();
        let span = info_span!("scheduled_task", task = %name);
        let handle = tokio::spawn(
            async move {
                tokio::select! {
                    () = tokio::time::sleep(delay) => task.await,
                    _ = shutdown.changed() => debug!("cancelled by shutdown before firing"),
                }
            }
            .instrument(span),
        );
        self.track(name, handle);
        Ok(())
    }

    /// Runs a task produced by `make_task` first after `initial_delay`, then
    /// every `period`, until shutdown. Ticks are sequential; a slow run
    /// delays the next one rather than overlapping it.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start` or after `stop`.
    pub fn schedule_repeating<F, Fut>(
        &self,
        name: impl Into<String>,
        initial_delay: Duration,
        period: Duration,
        make_task: F,
    ) -> Result<(), ExecutorError>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if !self.started.load(Ordering::Acquire) {
            return Err(ExecutorError::NotStarted);
        }
        let name = name.into();
        let mut shutdown = self.shutdown.subscribe();
        let span = info_span!("scheduled_task", task = %name);
        let handle = tokio::spawn(
            async move {
                tokio::select! {
                    () = tokio::time::sleep(initial_delay) => {}
                    _ = shutdown.changed() => {
                        debug!("cancelled by shutdown before first run");
                        return;
                    }
                }
                let mut ticker = tokio::time::interval(period);
                // The interval's immediate first tick lands exactly at the
                // initial delay.
                loop {
                    tokio::select! {
                        _ = ticker.tick() => make_task().await,
                        _ = shutdown.changed() => {
                            debug!("stopped by shutdown");
                            return;
                        }
                    }
                }
            }
            .instrument(span),
        );
        self.track(name, handle);
        Ok(())
    }

    /// Cancels one task by name. Returns whether a task was registered.
    pub fn cancel(&self, name: &str) -> bool {
        if let Some((_, handle)) = self.tasks.remove(name) {
            handle.abort();
            true
        } else {
            false
        }
    }

    /// Tasks currently registered and not yet finished.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .count()
    }

    /// Signals shutdown, waits up to `grace` for the tasks to wind down,
    /// then aborts the rest. Idempotent; further scheduling is rejected.
    pub async fn stop(&self, grace: Duration) {
        self.started.store(false, Ordering::Release);
        let _ = self.shutdown.send(true);
        let names: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            if let Some((_, handle)) = self.tasks.remove(&name) {
                handles.push(handle);
            }
        }
        let drained = tokio::time::timeout(grace, async {
            for handle in &mut handles {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("grace period elapsed; aborting remaining scheduled tasks");
            for handle in &handles {
                handle.abort();
            }
        }
        debug!("scheduler stopped");
    }

    fn track(&self, name: String, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(name.clone(), handle) {
            warn!(task = %name, "replacing a scheduled task with the same name");
            previous.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn once_task_fires_after_the_delay() {
        let scheduler = Scheduler::new();
        scheduler.start();
        let fired = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&fired);
        scheduler
            .schedule_once("ping", Duration::from_secs(2), async move {
                flag.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1900)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::Relaxed), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_task_honors_initial_delay_and_period() {
        let scheduler = Scheduler::new();
        scheduler.start();
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        scheduler
            .schedule_repeating(
                "sweep",
                Duration::from_secs(5),
                Duration::from_secs(10),
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                },
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::Relaxed), 0);

        // First run lands at the initial delay.
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_pending_timers() {
        let scheduler = Scheduler::new();
        scheduler.start();
        let fired = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&fired);
        scheduler
            .schedule_once("late", Duration::from_secs(3600), async move {
                flag.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        scheduler.stop(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::Relaxed), 0);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test]
    async fn scheduling_is_rejected_before_start_and_after_stop() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .schedule_once("early", Duration::from_secs(1), async {})
            .unwrap_err();
        assert!(matches!(err, ExecutorError::NotStarted));

        scheduler.start();
        scheduler
            .schedule_once("fine", Duration::from_secs(1), async {})
            .unwrap();

        scheduler.stop(Duration::from_secs(1)).await;
        let err = scheduler
            .schedule_repeating("late", Duration::from_secs(1), Duration::from_secs(1), || {
                async {}
            })
            .unwrap_err();
        assert!(matches!(err, ExecutorError::NotStarted));
    }

    #[tokio::test(start_paused = true)]
    async fn same_name_replaces_the_previous_task() {
        let scheduler = Scheduler::new();
        scheduler.start();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let flag = Arc::clone(&first);
        scheduler
            .schedule_once("job", Duration::from_secs(1), async move {
                flag.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        let flag = Arc::clone(&second);
        scheduler
            .schedule_once("job", Duration::from_secs(1), async move {
                flag.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(first.load(Ordering::Relaxed), 0);
        assert_eq!(second.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn cancel_removes_a_named_task() {
        let scheduler = Scheduler::new();
        scheduler.start();
        scheduler
            .schedule_once("doomed", Duration::from_secs(3600), async {})
            .unwrap();
        assert!(scheduler.cancel("doomed"));
        assert!(!scheduler.cancel("doomed"));
    }
}
