//! The service registry: an explicit registration table resolved by
//! contract, with a cached per-operation interceptor table.
//!
//! The registry is immutable after [`RegistryBuilder`](builder::RegistryBuilder)
//! finishes. All reads are lock-free; share it via `Arc`.

pub mod builder;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chassis_core::{precedence_key, ServiceDescriptor, SharingPolicy, TypeKey};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::interception::InterceptorChain;
use crate::resource::ResourceContext;

pub use builder::{Registration, RegistryBuilder};

// ---------------------------------------------------------------------------
// Erased plumbing
// ---------------------------------------------------------------------------

/// A type-erased service instance. Concretely always an `Arc<T>` unsized to
/// `dyn Any`, recovered by the caster of each binding.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A type-erased factory. Receives a resolver over the registry so it can
/// pull its dependencies.
pub(crate) type ErasedFactory =
    Arc<dyn Fn(&Resolver<'_>) -> anyhow::Result<AnyArc> + Send + Sync>;

/// Recovers `Arc<T>` from the erased instance and re-erases it as the bound
/// contract (`Box` holding an `Arc<C>`). `None` means the instance was not
/// the expected concrete type.
pub(crate) type ErasedCaster =
    Arc<dyn Fn(&AnyArc) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

pub(crate) struct RegistrationRecord {
    pub(crate) descriptor: ServiceDescriptor,
    pub(crate) factory: ErasedFactory,
    /// The cached instance for `Shared` services; `None` for `PerResolve`.
    pub(crate) shared: Option<AnyArc>,
}

/// One (contract, implementation) edge with its precedence inputs.
pub(crate) struct Binding {
    pub(crate) registration: usize,
    pub(crate) priority: i32,
    pub(crate) implementation: &'static str,
    pub(crate) caster: ErasedCaster,
}

#[derive(Default)]
pub(crate) struct RegistryCore {
    pub(crate) records: Vec<RegistrationRecord>,
    pub(crate) bindings: HashMap<TypeId, Vec<Binding>>,
    pub(crate) methods: HashMap<(TypeId, &'static str), InterceptorChain>,
}

impl RegistryCore {
    /// Keeps the binding list of one contract in precedence order. Called
    /// after every insertion so factories running mid-build already see the
    /// final order among the services bound so far.
    pub(crate) fn sort_bindings(&mut self, contract: TypeId) {
        if let Some(list) = self.bindings.get_mut(&contract) {
            list.sort_by_key(|binding| precedence_key(binding.priority, binding.implementation));
        }
    }

    fn materialize<C>(&self, binding: &Binding) -> Result<Arc<C>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        let record = &self.records[binding.registration];
        let instance: AnyArc = match &record.shared {
            Some(instance) => Arc::clone(instance),
            None => {
                let resolver = Resolver { core: self };
                (record.factory)(&resolver).map_err(|source| RegistryError::Instantiation {
                    service: record.descriptor.implementation.name(),
                    source,
                })?
            }
        };
        let contract = TypeKey::of::<C>().name();
        let boxed = (binding.caster)(&instance)
            .ok_or(RegistryError::ContractCast { contract })?;
        boxed
            .downcast::<Arc<C>>()
            .map(|arc| *arc)
            .map_err(|_| RegistryError::ContractCast { contract })
    }

    fn resolve<C>(&self) -> Result<Arc<C>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        let key = TypeKey::of::<C>();
        let binding = self
            .bindings
            .get(&key.id())
            .and_then(|list| list.first())
            .ok_or(RegistryError::ContractNotRegistered { contract: key.name() })?;
        self.materialize(binding)
    }

    fn resolve_all<C>(&self) -> Result<Vec<Arc<C>>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        let key = TypeKey::of::<C>();
        let Some(list) = self.bindings.get(&key.id()) else {
            return Ok(Vec::new());
        };
        list.iter().map(|binding| self.materialize(binding)).collect()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Dependency lookup handed to factories. During the build it sees exactly
/// the services registered before the factory's own registration.
pub struct Resolver<'r> {
    pub(crate) core: &'r RegistryCore,
}

impl Resolver<'_> {
    /// Resolves the highest-precedence binding of a contract.
    ///
    /// # Errors
    ///
    /// `ContractNotRegistered` when nothing is bound, `Instantiation` when a
    /// per-resolve factory fails.
    pub fn resolve<C>(&self) -> Result<Arc<C>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        self.core.resolve::<C>()
    }

    /// Resolves every binding of a contract in precedence order. An unknown
    /// contract yields an empty list.
    ///
    /// # Errors
    ///
    /// `Instantiation` when a per-resolve factory fails.
    pub fn resolve_all<C>(&self) -> Result<Vec<Arc<C>>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        self.core.resolve_all::<C>()
    }
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// The built, read-only registry.
pub struct ServiceRegistry {
    pub(crate) core: RegistryCore,
}

impl ServiceRegistry {
    /// Resolves the highest-precedence binding of a contract.
    ///
    /// # Errors
    ///
    /// `ContractNotRegistered` when nothing is bound, `Instantiation` when a
    /// per-resolve factory fails, `ContractCast` on a registration bug.
    pub fn resolve<C>(&self) -> Result<Arc<C>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        self.core.resolve::<C>()
    }

    /// Resolves every binding of a contract in precedence order. An unknown
    /// contract yields an empty list, matching "iterate whatever is there"
    /// call sites like the job sweep.
    ///
    /// # Errors
    ///
    /// `Instantiation` when a per-resolve factory fails.
    pub fn resolve_all<C>(&self) -> Result<Vec<Arc<C>>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        self.core.resolve_all::<C>()
    }

    /// The cached interceptor chain for one declared operation of `T`.
    ///
    /// # Errors
    ///
    /// `UnknownOperation` when the operation was never declared.
    pub fn method<T>(&self, operation: &'static str) -> Result<MethodBinding, RegistryError>
    where
        T: 'static,
    {
        let service = TypeKey::of::<T>().name();
        let chain = self
            .core
            .methods
            .get(&(TypeId::of::<T>(), operation))
            .cloned()
            .ok_or(RegistryError::UnknownOperation { service, operation })?;
        Ok(MethodBinding {
            service,
            operation,
            chain,
        })
    }

    /// All descriptors, sorted by implementation name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<&ServiceDescriptor> {
        let mut all: Vec<&ServiceDescriptor> =
            self.core.records.iter().map(|record| &record.descriptor).collect();
        all.sort_by_key(|descriptor| descriptor.implementation.name());
        all
    }

    /// A serializable dump of every registration.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            services: self
                .descriptors()
                .into_iter()
                .map(|descriptor| DescriptorSnapshot {
                    implementation: descriptor.implementation.name(),
                    contracts: descriptor
                        .contracts
                        .iter()
                        .map(|contract| contract.name())
                        .collect(),
                    priority: descriptor.priority,
                    effective_rank: descriptor.effective_rank(),
                    sharing: descriptor.sharing,
                })
                .collect(),
        }
    }

    /// Logs one line per registration, for startup diagnostics.
    pub fn log_descriptors(&self) {
        for descriptor in self.descriptors() {
            info!(
                implementation = descriptor.implementation.name(),
                contracts = ?descriptor
                    .contracts
                    .iter()
                    .map(|contract| contract.name())
                    .collect::<Vec<_>>(),
                priority = descriptor.priority,
                sharing = ?descriptor.sharing,
                "service binding"
            );
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.core.records.len())
            .field("contracts", &self.core.bindings.len())
            .field("operations", &self.core.methods.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MethodBinding
// ---------------------------------------------------------------------------

/// One declared operation plus its composed interceptor chain.
#[derive(Clone)]
pub struct MethodBinding {
    service: &'static str,
    operation: &'static str,
    chain: InterceptorChain,
}

impl MethodBinding {
    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Runs the call through the operation's interceptor chain.
    ///
    /// # Errors
    ///
    /// Whatever the interceptors or the call itself produce.
    pub async fn invoke<T, F>(&self, ctx: &mut ResourceContext, call: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: for<'b> FnOnce(&'b mut ResourceContext) -> BoxFuture<'b, anyhow::Result<T>>
            + Send
            + 'static,
    {
        let start = Instant::now();
        let result = self.chain.invoke(ctx, call).await;
        debug!(
            service = self.service,
            operation = self.operation,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome = if result.is_ok() { "ok" } else { "error" },
            "operation invoked"
        );
        result
    }
}

// ---------------------------------------------------------------------------
// Introspection snapshots
// ---------------------------------------------------------------------------

/// Serializable dump of the whole registration table.
#[derive(Debug, Serialize)]
pub struct RegistrySnapshot {
    pub services: Vec<DescriptorSnapshot>,
}

/// One registration in the dump, with both the declared priority and the
/// inverted rank actually used for ordering.
#[derive(Debug, Serialize)]
pub struct DescriptorSnapshot {
    pub implementation: &'static str,
    pub contracts: Vec<&'static str>,
    pub priority: i32,
    pub effective_rank: i64,
    pub sharing: SharingPolicy,
}
