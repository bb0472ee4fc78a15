//! The process-wide locator handle.
//!
//! A write-once slot for the built registry, meant as a fallback for code
//! that cannot take the registry as an argument. New code should prefer the
//! explicit [`JobContext`](crate::executor::JobContext) and constructor
//! injection; the handle exists for the edges where that is impractical.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chassis_core::TypeKey;
use tracing::{error, warn};

use crate::error::{LocatorError, RegistryError};
use crate::registry::ServiceRegistry;

/// The process-wide slot. Set once during startup, read from anywhere.
pub static LOCATOR: LocatorHandle = LocatorHandle::new();

/// Write-once holder of a built registry.
pub struct LocatorHandle {
    slot: ArcSwapOption<ServiceRegistry>,
}

impl Default for LocatorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorHandle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: ArcSwapOption::const_empty(),
        }
    }

    /// Publishes the registry. The first call wins; later calls are logged
    /// no-ops. Returns whether this call installed its registry.
    pub fn set(&self, registry: Arc<ServiceRegistry>) -> bool {
        let previous = self
            .slot
            .compare_and_swap(&None::<Arc<ServiceRegistry>>, Some(registry));
        if previous.is_some() {
            warn!("locator already initialized; keeping the existing registry");
            false
        } else {
            true
        }
    }

    /// The installed registry.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `set`.
    pub fn get(&self) -> Result<Arc<ServiceRegistry>, LocatorError> {
        self.slot.load_full().ok_or(LocatorError::NotInitialized)
    }

    /// Best-effort lookup: `None` (logged) when the locator is not
    /// initialized yet, the contract is unregistered, or resolution fails.
    /// For call sites with a sensible empty fallback.
    #[must_use]
    pub fn find<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + 'static,
    {
        let contract = TypeKey::of::<C>().name();
        let Some(registry) = self.slot.load_full() else {
            warn!(contract, "service lookup before locator initialization");
            return None;
        };
        match registry.resolve::<C>() {
            Ok(service) => Some(service),
            Err(RegistryError::ContractNotRegistered { .. }) => {
                warn!(contract, "contract not registered");
                None
            }
            Err(err) => {
                error!(contract, error = %err, "failed to resolve a registered contract");
                None
            }
        }
    }

    /// Hard lookup for call sites that assert the dependency must exist.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `set`, `NotRegistered` for an unknown
    /// contract, `Resolution` when a registered contract fails to
    /// instantiate.
    pub fn require<C>(&self) -> Result<Arc<C>, LocatorError>
    where
        C: ?Sized + 'static,
    {
        let contract = TypeKey::of::<C>().name();
        let registry = self.slot.load_full().ok_or(LocatorError::NotInitialized)?;
        registry.resolve::<C>().map_err(|err| match err {
            RegistryError::ContractNotRegistered { .. } => {
                LocatorError::NotRegistered { contract }
            }
            other => LocatorError::Resolution {
                contract,
                source: Box::new(other),
            },
        })
    }
}
