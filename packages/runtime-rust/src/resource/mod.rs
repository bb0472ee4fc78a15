//! Scoped-resource primitives: the handle state machine and the per-call
//! context that holds at most one live handle.
//!
//! The context is passed explicitly through call signatures instead of being
//! bound to an ambient thread identity. Each logical call chain constructs
//! exactly one context, which yields the "at most one live handle per
//! execution thread" invariant and makes nested-call detection a plain field
//! check.

use std::sync::atomic::{AtomicU64, Ordering};

use chassis_core::{Session, SessionError};

/// Monotonic handle ids, process-wide. Used for log correlation and for
/// asserting that concurrent call chains never share a handle.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// HandleState
// ---------------------------------------------------------------------------

/// Lifecycle of a resource handle.
///
/// State machine: Opened -> Active -> (Committed | RolledBack) -> Closed.
/// `close` is additionally reachable from every non-closed state so cleanup
/// can always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Session opened, no transaction yet.
    Opened,
    /// Transaction in progress.
    Active,
    /// Transaction committed; awaiting close.
    Committed,
    /// Transaction rolled back; awaiting close.
    RolledBack,
    /// Session closed; the handle is spent.
    Closed,
}

impl HandleState {
    #[must_use]
    fn name(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
            Self::Closed => "closed",
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceHandle
// ---------------------------------------------------------------------------

/// An open scoped resource: one session plus its transaction state.
///
/// Owned exclusively by the call frame that opened it; moved into the
/// [`ResourceContext`] while the wrapped invocation runs and taken back by
/// the owner for settlement. Never shared across tasks.
pub struct ResourceHandle {
    id: u64,
    session: Box<dyn Session>,
    state: HandleState,
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ResourceHandle {
    /// Wraps a freshly opened session. The handle starts in `Opened`.
    #[must_use]
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            session,
            state: HandleState::Opened,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Whether the underlying session has not been closed yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != HandleState::Closed
    }

    /// Whether a transaction is currently active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.state == HandleState::Active
    }

    /// Begins a transaction. Valid only from `Opened`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `InvalidTransition` when called out of
    /// order.
    pub async fn begin(&mut self) -> Result<(), SessionError> {
        if self.state != HandleState::Opened {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                to: HandleState::Active.name(),
            });
        }
        self.session.begin().await?;
        self.state = HandleState::Active;
        Ok(())
    }

    /// Commits the active transaction. Valid only from `Active`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `InvalidTransition` when no transaction
    /// is active. On a backend commit error the handle still leaves `Active`
    /// (the transaction is spent either way).
    pub async fn commit(&mut self) -> Result<(), SessionError> {
        if self.state != HandleState::Active {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                to: HandleState::Committed.name(),
            });
        }
        let result = self.session.commit().await;
        self.state = HandleState::Committed;
        result
    }

    /// Rolls back the active transaction. Valid only from `Active`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `InvalidTransition` when no transaction
    /// is active.
    pub async fn rollback(&mut self) -> Result<(), SessionError> {
        if self.state != HandleState::Active {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                to: HandleState::RolledBack.name(),
            });
        }
        let result = self.session.rollback().await;
        self.state = HandleState::RolledBack;
        result
    }

    /// Closes the session. Reachable from every state; closing twice is an
    /// `InvalidTransition`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `InvalidTransition` on double close.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if self.state == HandleState::Closed {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                to: HandleState::Closed.name(),
            });
        }
        let result = self.session.close().await;
        self.state = HandleState::Closed;
        result
    }
}

// ---------------------------------------------------------------------------
// ResourceContext
// ---------------------------------------------------------------------------

/// Single-slot holder for the one live resource handle of a call chain.
///
/// Deliberately neither `Clone` nor `Sync`: a context belongs to exactly one
/// logical invocation chain, and concurrent chains each build their own.
#[derive(Debug, Default)]
pub struct ResourceContext {
    slot: Option<ResourceHandle>,
}

impl ResourceContext {
    #[must_use]
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Whether any handle is bound, open or not.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    /// Whether an open handle is bound; this is the nested-call check.
    #[must_use]
    pub fn has_open_handle(&self) -> bool {
        self.slot.as_ref().is_some_and(ResourceHandle::is_open)
    }

    /// Binds a handle into the slot. The slot must be empty; the interceptor
    /// checks [`has_open_handle`](Self::has_open_handle) before opening.
    pub fn bind(&mut self, handle: ResourceHandle) {
        debug_assert!(self.slot.is_none(), "resource context slot already bound");
        self.slot = Some(handle);
    }

    /// Takes the bound handle back out, if any.
    pub fn unbind(&mut self) -> Option<ResourceHandle> {
        self.slot.take()
    }

    #[must_use]
    pub fn handle(&self) -> Option<&ResourceHandle> {
        self.slot.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut ResourceHandle> {
        self.slot.as_mut()
    }
}
