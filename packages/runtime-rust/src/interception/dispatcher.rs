//! Maps declared operations to their interceptor chains.
//!
//! Queried once per operation at registry build time; the registry caches
//! the returned chains in its method table.

use std::sync::Arc;

use chassis_core::OperationSpec;

use crate::interception::chain::{InterceptorChain, MethodInterceptor};
use crate::interception::unit_of_work::UnitOfWorkInterceptor;

/// Decides which interceptors apply to a declared operation.
pub struct InterceptionDispatcher {
    unit_of_work: Arc<UnitOfWorkInterceptor>,
}

impl InterceptionDispatcher {
    #[must_use]
    pub fn new(unit_of_work: Arc<UnitOfWorkInterceptor>) -> Self {
        Self { unit_of_work }
    }

    /// The chain for one operation: the unit-of-work interceptor when the
    /// operation declares a scope, empty otherwise.
    #[must_use]
    pub fn method_interceptors(&self, spec: &OperationSpec) -> InterceptorChain {
        if spec.unit_of_work {
            InterceptorChain::new(vec![
                Arc::clone(&self.unit_of_work) as Arc<dyn MethodInterceptor>
            ])
        } else {
            InterceptorChain::empty()
        }
    }

    /// Constructor-level interception is unsupported; scoping is
    /// method-granular only.
    #[must_use]
    pub fn constructor_interceptors(&self) -> InterceptorChain {
        InterceptorChain::empty()
    }
}
