//! Session collaborator traits.
//!
//! The persistence engine itself is outside this system; the runtime only
//! consumes the handle protocol below. A backend opens sessions, a session
//! supports exactly one begin/commit-or-rollback cycle and is then closed.
//! Thread binding and "is a session already bound here" queries are not part
//! of this protocol; they live on the explicitly passed `ResourceContext`
//! in the runtime crate.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the session collaborator or by the handle state machine
/// wrapped around it.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open session: {0}")]
    Open(String),
    #[error("failed to begin transaction: {0}")]
    Begin(String),
    #[error("failed to commit transaction: {0}")]
    Commit(String),
    #[error("failed to roll back transaction: {0}")]
    Rollback(String),
    #[error("failed to close session: {0}")]
    Close(String),
    #[error("invalid resource handle transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Factory for scoped-resource sessions.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Opens a fresh session. The caller owns the returned session and is
    /// responsible for closing it.
    async fn open_session(&self) -> Result<Box<dyn Session>, SessionError>;
}

/// One opaque session plus its transaction primitives.
///
/// The runtime drives this through a strict lifecycle: `begin` once, then
/// exactly one of `commit`/`rollback`, then `close`. Implementations may
/// treat violations as errors or ignore them; the runtime's handle state
/// machine prevents them from being issued at all.
#[async_trait]
pub trait Session: Send {
    async fn begin(&mut self) -> Result<(), SessionError>;
    async fn commit(&mut self) -> Result<(), SessionError>;
    async fn rollback(&mut self) -> Result<(), SessionError>;
    async fn close(&mut self) -> Result<(), SessionError>;
}
