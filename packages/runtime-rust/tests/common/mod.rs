//! Shared test fixtures: an in-memory session backend with observable
//! staging, plus a typed business error.
//!
//! Each integration test binary compiles this module separately and uses a
//! different subset of it.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chassis_core::{Session, SessionBackend, SessionError};
use parking_lot::Mutex;

/// Opt-in log output for debugging: `RUST_LOG=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lifecycle counters shared between a backend and its sessions.
#[derive(Default)]
pub struct Counters {
    pub opens: AtomicU32,
    pub commits: AtomicU32,
    pub rollbacks: AtomicU32,
    pub closes: AtomicU32,
}

/// In-memory transactional store. Writes land in `staged` and move to
/// `committed` on commit; rollback discards them.
#[derive(Default)]
pub struct FakeBackend {
    pub staged: Arc<Mutex<Vec<String>>>,
    pub committed: Arc<Mutex<Vec<String>>>,
    pub counters: Arc<Counters>,
    pub fail_commit: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stages a row as a business method running inside the scope would.
    pub fn write(&self, row: impl Into<String>) {
        self.staged.lock().push(row.into());
    }

    pub fn committed_rows(&self) -> Vec<String> {
        self.committed.lock().clone()
    }
}

pub struct FakeSession {
    staged: Arc<Mutex<Vec<String>>>,
    committed: Arc<Mutex<Vec<String>>>,
    counters: Arc<Counters>,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn open_session(&self) -> Result<Box<dyn Session>, SessionError> {
        self.counters.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeSession {
            staged: Arc::clone(&self.staged),
            committed: Arc::clone(&self.committed),
            counters: Arc::clone(&self.counters),
            fail_commit: Arc::clone(&self.fail_commit),
        }))
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn begin(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        if self.fail_commit.load(Ordering::Relaxed) {
            return Err(SessionError::Commit("disk full".to_string()));
        }
        let mut staged = self.staged.lock();
        self.committed.lock().append(&mut staged);
        self.counters.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.staged.lock().clear();
        self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.counters.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Business error with a stable identity for downcast assertions.
#[derive(Debug, thiserror::Error)]
#[error("boom: {0}")]
pub struct Boom(pub &'static str);
