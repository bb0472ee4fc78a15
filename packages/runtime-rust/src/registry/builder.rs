//! Registry construction: the explicit registration table and the build
//! pass that turns it into an immutable [`ServiceRegistry`].
//!
//! The build binds the interception-support services first, instantiates
//! `Shared` services eagerly in registration order (so factories can resolve
//! anything registered before them), and composes the interceptor chain of
//! every declared operation exactly once.

use std::any::{Any, TypeId};
use std::sync::Arc;

use chassis_core::{
    OperationSpec, ServiceDescriptor, SessionBackend, SharingPolicy, TypeKey, NEUTRAL_PRIORITY,
};
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::interception::{
    InterceptionDispatcher, InterceptorChain, MethodInterceptor, UnitOfWorkInterceptor,
};
use crate::registry::{
    AnyArc, Binding, ErasedCaster, ErasedFactory, RegistrationRecord, RegistryCore, Resolver,
    ServiceRegistry,
};

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Builder for one service registration.
///
/// The factory is the service's constructor; it receives a [`Resolver`] for
/// its dependencies. Defaults: neutral priority, `Shared` sharing, bound to
/// its own type when no contract is declared.
pub struct Registration<T: Send + Sync + 'static> {
    factory: Arc<dyn Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync>,
    priority: i32,
    sharing: SharingPolicy,
    contracts: Vec<(TypeKey, ErasedCaster)>,
    operations: Vec<OperationSpec>,
}

impl<T: Send + Sync + 'static> Registration<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            priority: NEUTRAL_PRIORITY,
            sharing: SharingPolicy::Shared,
            contracts: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Registers an already constructed instance as a `Shared` service.
    pub fn instance(instance: Arc<T>) -> Self {
        Self::new(move |_resolver| Ok(Arc::clone(&instance)))
    }

    /// Declared priority; smaller wins. Absent means lowest precedence.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Construct a fresh instance per resolution instead of sharing one.
    #[must_use]
    pub fn per_resolve(mut self) -> Self {
        self.sharing = SharingPolicy::PerResolve;
        self
    }

    /// Binds the service to a contract. `cast` is the unsizing step, usually
    /// just `|svc| svc`. May be repeated for several contracts.
    #[must_use]
    pub fn contract<C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let caster: ErasedCaster = Arc::new(move |any: &AnyArc| {
            let arc = Arc::clone(any).downcast::<T>().ok()?;
            Some(Box::new(cast(arc)) as Box<dyn Any + Send + Sync>)
        });
        self.contracts.push((TypeKey::of::<C>(), caster));
        self
    }

    /// Declares a method with no interception.
    #[must_use]
    pub fn operation(mut self, name: &'static str) -> Self {
        self.operations.push(OperationSpec::plain(name));
        self
    }

    /// Declares a method whose invocations run inside a managed unit of work.
    #[must_use]
    pub fn operation_in_unit_of_work(mut self, name: &'static str) -> Self {
        self.operations.push(OperationSpec::unit_of_work(name));
        self
    }

    fn into_erased(self) -> ErasedRegistration {
        let mut contracts = self.contracts;
        if contracts.is_empty() {
            // No contract declared: bind the implementation to itself.
            let caster: ErasedCaster = Arc::new(|any: &AnyArc| {
                let arc = Arc::clone(any).downcast::<T>().ok()?;
                Some(Box::new(arc) as Box<dyn Any + Send + Sync>)
            });
            contracts.push((TypeKey::of::<T>(), caster));
        }
        let descriptor = ServiceDescriptor {
            implementation: TypeKey::of::<T>(),
            contracts: contracts.iter().map(|(key, _)| *key).collect(),
            priority: self.priority,
            sharing: self.sharing,
        };
        let typed = self.factory;
        let factory: ErasedFactory =
            Arc::new(move |resolver| typed(resolver).map(|arc| arc as AnyArc));
        ErasedRegistration {
            descriptor,
            factory,
            contracts,
            operations: self.operations,
        }
    }
}

pub(crate) struct ErasedRegistration {
    descriptor: ServiceDescriptor,
    factory: ErasedFactory,
    contracts: Vec<(TypeKey, ErasedCaster)>,
    operations: Vec<OperationSpec>,
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Accumulates registrations, then builds the immutable registry.
pub struct RegistryBuilder {
    backend: Option<Arc<dyn SessionBackend>>,
    registrations: Vec<ErasedRegistration>,
}

impl RegistryBuilder {
    /// A builder whose registry supports unit-of-work operations.
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend: Some(backend),
            registrations: Vec::new(),
        }
    }

    /// A builder for registries with no scoped resource at all. Declaring a
    /// unit-of-work operation on one is a fatal build error.
    #[must_use]
    pub fn without_session_backend() -> Self {
        Self {
            backend: None,
            registrations: Vec::new(),
        }
    }

    /// Appends one registration. Attempts to re-register the interception-
    /// support types are skipped; the build binds those itself, first.
    #[must_use]
    pub fn register<T: Send + Sync + 'static>(mut self, registration: Registration<T>) -> Self {
        let implementation = TypeId::of::<T>();
        if implementation == TypeId::of::<UnitOfWorkInterceptor>()
            || implementation == TypeId::of::<InterceptionDispatcher>()
        {
            warn!(
                implementation = std::any::type_name::<T>(),
                "skipping re-registration of an interception-support type"
            );
            return self;
        }
        self.registrations.push(registration.into_erased());
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// `InterceptionSupport` when a unit-of-work operation is declared but no
    /// session backend was provided. Individual factory failures of user
    /// services are not errors: the candidate is skipped with a warning.
    pub fn build(self) -> Result<ServiceRegistry, RegistryError> {
        let mut core = RegistryCore::default();

        let dispatcher = match self.backend {
            Some(backend) => {
                let uow = Arc::new(UnitOfWorkInterceptor::new(backend));
                let dispatcher = Arc::new(InterceptionDispatcher::new(Arc::clone(&uow)));
                bind_interception_support(&mut core, uow, Arc::clone(&dispatcher))?;
                Some(dispatcher)
            }
            None => {
                let scoped = self.registrations.iter().any(|registration| {
                    registration.operations.iter().any(|op| op.unit_of_work)
                });
                if scoped {
                    return Err(RegistryError::InterceptionSupport {
                        reason: "unit-of-work operations declared but no session backend \
                                 was provided"
                            .to_string(),
                    });
                }
                None
            }
        };

        for erased in self.registrations {
            install(&mut core, erased, dispatcher.as_deref());
        }

        debug!(
            services = core.records.len(),
            contracts = core.bindings.len(),
            operations = core.methods.len(),
            "registry built"
        );
        Ok(ServiceRegistry { core })
    }
}

/// Binds one registration into the core: eager instance for `Shared`
/// services, method table entries, contract bindings. A failing `Shared`
/// factory skips the whole candidate.
fn install(
    core: &mut RegistryCore,
    erased: ErasedRegistration,
    dispatcher: Option<&InterceptionDispatcher>,
) {
    let ErasedRegistration {
        descriptor,
        factory,
        contracts,
        operations,
    } = erased;

    let shared = match descriptor.sharing {
        SharingPolicy::Shared => {
            let resolver = Resolver { core: &*core };
            match factory(&resolver) {
                Ok(instance) => Some(instance),
                Err(err) => {
                    warn!(
                        implementation = descriptor.implementation.name(),
                        error = format!("{err:#}"),
                        "skipping service registration; factory failed"
                    );
                    return;
                }
            }
        }
        SharingPolicy::PerResolve => None,
    };

    for op in &operations {
        let chain = dispatcher.map_or_else(InterceptorChain::empty, |dispatcher| {
            dispatcher.method_interceptors(op)
        });
        core.methods
            .insert((descriptor.implementation.id(), op.name), chain);
    }

    let index = core.records.len();
    let priority = descriptor.priority;
    let implementation = descriptor.implementation.name();
    core.records.push(RegistrationRecord {
        descriptor,
        factory,
        shared,
    });
    for (key, caster) in contracts {
        core.bindings.entry(key.id()).or_default().push(Binding {
            registration: index,
            priority,
            implementation,
            caster,
        });
        core.sort_bindings(key.id());
    }
}

/// Binds the unit-of-work interceptor and the dispatcher as `Shared`
/// services before any user registration is processed. Wrapping happens at
/// build time, so these must exist first.
fn bind_interception_support(
    core: &mut RegistryCore,
    uow: Arc<UnitOfWorkInterceptor>,
    dispatcher: Arc<InterceptionDispatcher>,
) -> Result<(), RegistryError> {
    let uow_registration = Registration::instance(uow)
        .contract::<UnitOfWorkInterceptor>(|svc| svc)
        .contract::<dyn MethodInterceptor>(|svc| svc)
        .into_erased();
    let dispatcher_registration = Registration::instance(dispatcher).into_erased();

    let before = core.records.len();
    install(core, uow_registration, None);
    install(core, dispatcher_registration, None);
    if core.records.len() != before + 2 {
        // Instance factories cannot fail; reaching this means the support
        // bindings were silently dropped.
        return Err(RegistryError::InterceptionSupport {
            reason: "failed to bind interception-support services".to_string(),
        });
    }
    Ok(())
}
