//! The interceptor chain: a wrapping combinator over type-erased invocations.
//!
//! An interceptor receives the resource context and a `next` continuation.
//! Calling `next(ctx)` reborrows the context for the inner frames only, so
//! the interceptor gets it back afterwards for settlement work. The erased
//! result travels as `Box<dyn Any + Send>`; business errors travel as
//! `anyhow::Error` and reach the caller unchanged.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::resource::ResourceContext;

/// Type-erased result of one wrapped invocation.
pub type InvokeOutcome = anyhow::Result<Box<dyn Any + Send>>;

/// Continuation handed to an interceptor. The inner `for<'b>` reborrow is
/// what lets the interceptor keep using the context after awaiting `next`.
pub type Next<'a> =
    Box<dyn for<'b> FnOnce(&'b mut ResourceContext) -> BoxFuture<'b, InvokeOutcome> + Send + 'a>;

/// One link of cross-cutting behavior around a method invocation.
///
/// Implementations decide whether and when to call `next`; not calling it
/// short-circuits the invocation.
#[async_trait]
pub trait MethodInterceptor: Send + Sync {
    async fn invoke(&self, ctx: &mut ResourceContext, next: Next<'_>) -> InvokeOutcome;
}

/// An ordered set of interceptors composed around a terminal call.
///
/// Built once per declared operation and cached; cloning shares the slice.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn MethodInterceptor>]>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    /// A chain with no interceptors; `invoke` degenerates to a direct call.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            interceptors: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn new(interceptors: Vec<Arc<dyn MethodInterceptor>>) -> Self {
        Self {
            interceptors: Arc::from(interceptors),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs `call` wrapped by every interceptor, outside-in, and downcasts
    /// the erased result back to `T`.
    ///
    /// Callers write the terminal as `|ctx| Box::pin(async move { .. })` so
    /// the future's borrow of the context is tied to the reborrow.
    ///
    /// # Errors
    ///
    /// Whatever the interceptors or the terminal call produce, unchanged. A
    /// result-type mismatch indicates a short-circuiting interceptor that
    /// substituted a foreign value and is reported as an error.
    pub async fn invoke<T, F>(&self, ctx: &mut ResourceContext, call: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: for<'b> FnOnce(&'b mut ResourceContext) -> BoxFuture<'b, anyhow::Result<T>>
            + Send
            + 'static,
    {
        let terminal: Next<'static> = Box::new(move |ctx| {
            let fut = call(ctx);
            Box::pin(async move { fut.await.map(|value| Box::new(value) as Box<dyn Any + Send>) })
        });
        let raw = proceed(Arc::clone(&self.interceptors), 0, ctx, terminal).await?;
        raw.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            anyhow::anyhow!("interceptor chain produced a result of an unexpected type")
        })
    }
}

/// Recursive composition step: take the interceptor at `index` and hand it
/// a continuation over the rest of the slice.
///
/// The continuation captures only owned data (the shared slice, the next
/// index, the terminal), so it satisfies the `for<'b>` reborrow of [`Next`]
/// no matter how deep the recursion goes.
fn proceed<'a>(
    interceptors: Arc<[Arc<dyn MethodInterceptor>]>,
    index: usize,
    ctx: &'a mut ResourceContext,
    terminal: Next<'static>,
) -> BoxFuture<'a, InvokeOutcome> {
    let Some(head) = interceptors.get(index).map(Arc::clone) else {
        return terminal(ctx);
    };
    let next: Next<'static> = Box::new(move |ctx| proceed(interceptors, index + 1, ctx, terminal));
    Box::pin(async move { head.invoke(ctx, next).await })
}
