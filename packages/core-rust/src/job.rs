//! Job metadata.
//!
//! A job is any unit of ranked work run by the executor once the container
//! reaches its ready transition. Startup jobs run once; scheduled jobs are
//! also invoked exactly once, and use that invocation to register their own
//! recurring tasks on the shared scheduler.

use std::time::Duration;

/// Kind of job, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Runs once during the ready transition.
    Startup,
    /// Invoked once during the ready transition; expected to enqueue its own
    /// repeating task(s) with the given timing onto the scheduler.
    Scheduled {
        initial_delay: Duration,
        period: Duration,
    },
}

/// Immutable record of one job registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Registration name, unique among jobs; tie-breaker for equal priorities.
    pub name: &'static str,
    /// Declared priority, smaller wins; same convention and same inversion
    /// as contract bindings.
    pub priority: i32,
    /// Startup or scheduled.
    pub kind: JobKind,
}

impl JobDescriptor {
    /// A startup job descriptor.
    #[must_use]
    pub fn startup(name: &'static str, priority: i32) -> Self {
        Self {
            name,
            priority,
            kind: JobKind::Startup,
        }
    }

    /// A scheduled job descriptor with its recurrence timing.
    #[must_use]
    pub fn scheduled(
        name: &'static str,
        priority: i32,
        initial_delay: Duration,
        period: Duration,
    ) -> Self {
        Self {
            name,
            priority,
            kind: JobKind::Scheduled {
                initial_delay,
                period,
            },
        }
    }
}
