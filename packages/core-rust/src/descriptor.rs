//! Service descriptor model.
//!
//! Descriptors are pure data built once when the registry is assembled and
//! immutable afterwards: which implementation, which contracts it satisfies,
//! its declared priority, and its instance-sharing policy.

use std::any::TypeId;

use serde::Serialize;

use crate::rank::{effective_rank, NEUTRAL_PRIORITY};

// ---------------------------------------------------------------------------
// TypeKey
// ---------------------------------------------------------------------------

/// Identifies an implementation type or a contract (`dyn Trait`) without any
/// runtime reflection: a `TypeId` for lookup plus the type name for logs and
/// deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Builds the key for `T`. Works for both concrete types and `dyn Trait`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ---------------------------------------------------------------------------
// SharingPolicy
// ---------------------------------------------------------------------------

/// Instance-sharing policy for a registered service.
///
/// The registry default is [`SharingPolicy::Shared`]: one instance for the
/// container's lifetime. This deliberately overrides a naive
/// fresh-instance-per-lookup default, which surprises most callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPolicy {
    /// One instance, constructed when the registry is built, shared by all
    /// resolutions.
    Shared,
    /// A fresh instance constructed on every resolution.
    PerResolve,
}

// ---------------------------------------------------------------------------
// ServiceDescriptor
// ---------------------------------------------------------------------------

/// Immutable record of one service registration.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The concrete implementation type.
    pub implementation: TypeKey,
    /// Contracts this implementation is bound to. When a registration declares
    /// none, the implementation is bound to itself and this holds exactly the
    /// implementation key.
    pub contracts: Vec<TypeKey>,
    /// Declared priority, smaller wins. [`NEUTRAL_PRIORITY`] when absent.
    pub priority: i32,
    /// Instance-sharing policy.
    pub sharing: SharingPolicy,
}

impl ServiceDescriptor {
    /// The container-native rank this descriptor registers under, via the
    /// single inversion function shared with job ordering.
    #[must_use]
    pub fn effective_rank(&self) -> i64 {
        effective_rank(self.priority)
    }

    /// Whether the registration carried an explicit priority.
    #[must_use]
    pub fn has_explicit_priority(&self) -> bool {
        self.priority != NEUTRAL_PRIORITY
    }
}

// ---------------------------------------------------------------------------
// OperationSpec
// ---------------------------------------------------------------------------

/// Registration-time declaration of one service method, replacing annotation
/// scanning: the dispatcher consults this table once per registration to
/// decide which methods run inside a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// Method name, unique within its service.
    pub name: &'static str,
    /// Whether invocations must be wrapped in a managed unit of work.
    pub unit_of_work: bool,
}

impl OperationSpec {
    /// An operation with no interception.
    #[must_use]
    pub fn plain(name: &'static str) -> Self {
        Self {
            name,
            unit_of_work: false,
        }
    }

    /// An operation that runs inside a managed unit of work.
    #[must_use]
    pub fn unit_of_work(name: &'static str) -> Self {
        Self {
            name,
            unit_of_work: true,
        }
    }
}
