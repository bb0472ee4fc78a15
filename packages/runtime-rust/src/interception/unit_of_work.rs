//! The unit-of-work interceptor: one session and one transaction per
//! outermost intercepted call.
//!
//! The outermost frame on a context owns the whole lifecycle. Nested
//! intercepted calls on the same context detect the open handle and run
//! inside it without committing, rolling back, or closing anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chassis_core::SessionBackend;
use tracing::{debug, error, warn};

use crate::interception::chain::{InvokeOutcome, MethodInterceptor, Next};
use crate::resource::{ResourceContext, ResourceHandle};

/// Wraps declared operations in open/begin .. commit-or-rollback .. close.
pub struct UnitOfWorkInterceptor {
    backend: Arc<dyn SessionBackend>,
    commit_failures: AtomicU64,
}

impl UnitOfWorkInterceptor {
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            commit_failures: AtomicU64::new(0),
        }
    }

    /// Commits that failed after a successful invocation. The business
    /// result was still returned to the caller in each counted case.
    #[must_use]
    pub fn commit_failure_count(&self) -> u64 {
        self.commit_failures.load(Ordering::Relaxed)
    }

    /// Settles and closes the handle the owner frame took back out of the
    /// context. Settlement failures are logged and never override the
    /// outcome already produced; `succeeded` is all this needs to know
    /// about it.
    async fn settle(&self, mut handle: ResourceHandle, succeeded: bool) {
        let handle_id = handle.id();
        if handle.in_transaction() {
            if succeeded {
                if let Err(err) = handle.commit().await {
                    self.commit_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        handle_id,
                        error = %err,
                        "commit failed after successful invocation; result returned anyway"
                    );
                }
            } else if let Err(err) = handle.rollback().await {
                error!(handle_id, error = %err, "rollback failed");
            }
        }
        if let Err(err) = handle.close().await {
            warn!(handle_id, error = %err, "failed to close session");
        }
    }
}

#[async_trait]
impl MethodInterceptor for UnitOfWorkInterceptor {
    async fn invoke(&self, ctx: &mut ResourceContext, next: Next<'_>) -> InvokeOutcome {
        if ctx.has_open_handle() {
            // Nested frame: join the scope the owner already opened.
            let handle_id = ctx.handle().map(ResourceHandle::id);
            debug!(handle_id, "joining open resource scope");
            return next(ctx).await;
        }

        let session = self.backend.open_session().await?;
        let mut handle = ResourceHandle::new(session);
        if let Err(err) = handle.begin().await {
            if let Err(close_err) = handle.close().await {
                warn!(error = %close_err, "failed to close session after begin failure");
            }
            return Err(err.into());
        }
        let handle_id = handle.id();
        debug!(handle_id, "opened resource scope");

        ctx.bind(handle);
        let outcome = next(ctx).await;
        let Some(handle) = ctx.unbind() else {
            // Inner code removed the handle; there is nothing to settle.
            warn!(handle_id, "resource handle was taken out of the context");
            return outcome;
        };
        self.settle(handle, outcome.is_ok()).await;
        outcome
    }
}
