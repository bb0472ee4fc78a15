//! Typed errors for the registry, locator, and executors.
//!
//! Business errors never appear here: they cross the interceptor chain as
//! `anyhow::Error` and reach the caller unchanged.

use thiserror::Error;

/// Errors raised while building or resolving from the service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The interception-support components could not be bound. Unlike an
    /// ordinary registration failure this is fatal: without them the
    /// unit-of-work contract would silently not apply anywhere.
    #[error("interception support unavailable: {reason}")]
    InterceptionSupport { reason: String },

    /// No binding exists for the requested contract.
    #[error("no binding registered for contract {contract}")]
    ContractNotRegistered { contract: &'static str },

    /// A binding exists but the implementation's factory failed.
    #[error("failed to instantiate service {service}")]
    Instantiation {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The requested operation was never declared for the service.
    #[error("unknown operation {operation} on {service}")]
    UnknownOperation {
        service: &'static str,
        operation: &'static str,
    },

    /// A binding's caster produced a value of the wrong type. Indicates a
    /// registration bug (contract key and cast closure disagree).
    #[error("type mismatch resolving contract {contract}")]
    ContractCast { contract: &'static str },
}

/// Errors raised by the process-wide locator handle.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// The locator has not been initialized yet. Transient: callers with a
    /// fallback treat this as "nothing available right now", not a crash.
    #[error("service locator not initialized yet")]
    NotInitialized,

    /// A required contract has no binding. Hard failure for call sites that
    /// assert the dependency must exist.
    #[error("required contract not registered: {contract}")]
    NotRegistered { contract: &'static str },

    /// The contract is registered but resolution failed.
    #[error("failed to resolve contract {contract}")]
    Resolution {
        contract: &'static str,
        #[source]
        source: Box<RegistryError>,
    },
}

/// Errors raised by the task pool and scheduler.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor must be started before first use.
    #[error("executor not started")]
    NotStarted,

    /// The executor is stopping or stopped and accepts no new work.
    #[error("executor is shutting down")]
    ShuttingDown,
}
