//! Runtime tuning knobs.
//!
//! No file format is owned here; an embedding application deserializes this
//! from whatever configuration source it already has.

use std::time::Duration;

use serde::Deserialize;

/// Executor sizing and shutdown behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Workers draining the general task pool.
    pub worker_count: usize,
    /// Pending tasks the pool accepts before submissions run inline.
    pub queue_capacity: usize,
    /// How long `stop` waits for in-flight work before force-cancelling.
    pub shutdown_grace_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_capacity: 1000,
            shutdown_grace_ms: 10_000,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
