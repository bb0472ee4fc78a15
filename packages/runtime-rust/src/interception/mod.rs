//! Method interception.
//!
//! Cross-cutting behavior is attached to declared operations as a chain of
//! interceptors, composed once at registry build time and cached in the
//! method table. Per-call cost is the chain invocation itself.

pub mod chain;
pub mod dispatcher;
pub mod unit_of_work;

pub use chain::{InterceptorChain, InvokeOutcome, MethodInterceptor, Next};
pub use dispatcher::InterceptionDispatcher;
pub use unit_of_work::UnitOfWorkInterceptor;
