//! The registry switch.
//!
//! For every intercepted operation the switch decides which backing store
//! services the request's handle:
//!
//! 1. a handle bound in the virtual store goes to the virtual store
//! 2. a handle bound in the transparent store goes to the transparent store
//! 3. a hive-root handle goes to the default store for that hive
//! 4. any other handle is recovered through the host bridge, if allowed
//!
//! The virtualization type is recomputed from the final path on every
//! resolution, even when a branch already computed it.

use std::sync::Arc;

use hivefold_core::{Hive, KeyPath, RuleCollection, VirtualizationType};
use hivefold_host::{HostRegistry, RawHandle};
use tracing::{debug, error, warn};

use crate::error::SwitchError;
use crate::request::RegistryRequest;
use crate::store::{RegistryStore, StoreKind};

/// Routing engine between the virtual and transparent stores.
pub struct RegistrySwitch {
    virtual_store: Arc<dyn RegistryStore>,
    transparent_store: Arc<dyn RegistryStore>,
    rules: RuleCollection,
    host: Arc<dyn HostRegistry>,
}

impl RegistrySwitch {
    /// Create a switch over two stores.
    pub fn new(
        virtual_store: Arc<dyn RegistryStore>,
        transparent_store: Arc<dyn RegistryStore>,
        rules: RuleCollection,
        host: Arc<dyn HostRegistry>,
    ) -> Self {
        Self {
            virtual_store,
            transparent_store,
            rules,
            host,
        }
    }

    /// The store behind `kind`.
    pub fn store(&self, kind: StoreKind) -> &dyn RegistryStore {
        match kind {
            StoreKind::Virtual => self.virtual_store.as_ref(),
            StoreKind::Transparent => self.transparent_store.as_ref(),
        }
    }

    /// The virtual store
    pub fn virtual_store(&self) -> &dyn RegistryStore {
        self.virtual_store.as_ref()
    }

    /// The transparent store
    pub fn transparent_store(&self) -> &dyn RegistryStore {
        self.transparent_store.as_ref()
    }

    /// The rule collection consulted before the fallback policy
    pub fn rules(&self) -> &RuleCollection {
        &self.rules
    }

    // ========== Resolution ==========

    /// Pick the store that must service `request`.
    ///
    /// On success the request carries its resolved path and virtualization
    /// type. On failure both are cleared and the error says why.
    pub fn resolve(
        &self,
        request: &mut RegistryRequest,
        allow_recovery: bool,
    ) -> Result<StoreKind, SwitchError> {
        let routed = self.route(request, allow_recovery);
        let virtualization = self.virtualization_type(request.path());
        match (routed, virtualization) {
            (Ok(kind), Ok(virtualization)) => {
                request.set_virtualization_type(virtualization);
                Ok(kind)
            }
            (Err(err), _) | (Ok(_), Err(err)) => {
                request.clear_resolution();
                Err(err)
            }
        }
    }

    /// Like [`RegistrySwitch::resolve`], returning the store itself.
    pub fn resolve_store(
        &self,
        request: &mut RegistryRequest,
        allow_recovery: bool,
    ) -> Result<&dyn RegistryStore, SwitchError> {
        let kind = self.resolve(request, allow_recovery)?;
        Ok(self.store(kind))
    }

    fn route(
        &self,
        request: &mut RegistryRequest,
        allow_recovery: bool,
    ) -> Result<StoreKind, SwitchError> {
        for store in [&self.virtual_store, &self.transparent_store] {
            if !store.is_known_request(request) {
                continue;
            }
            // A concurrent close can unbind between the two lookups.
            if let Some(path) = store.key_path(request.handle()) {
                request.set_path(path);
                return Ok(store.kind());
            }
        }

        if let Some(hive) = Hive::from_handle(request.handle()) {
            request.set_path(hive.canonical_path());
            return self.assign_default_store(request);
        }

        if allow_recovery {
            return self.recover(request);
        }

        error!(handle = %request.handle(), "Unknown registry key handle");
        Err(SwitchError::UnknownHandle(request.handle()))
    }

    /// Adopt a handle the switch never issued.
    fn recover(&self, request: &mut RegistryRequest) -> Result<StoreKind, SwitchError> {
        let handle = request.handle();
        let raw = RawHandle(handle.raw());
        let Some(path) = self.host.key_path_by_handle(raw) else {
            error!(handle = %handle, "Unknown registry key handle");
            return Err(SwitchError::UnknownHandle(handle));
        };
        warn!(handle = %handle, path = %path, "Recovering from unknown registry key handle");

        request.set_path(path.clone());
        let kind = self.assign_default_store(request)?;
        let target = self.store(kind);

        // The value is already bound under another path.
        if let Some(owner) = [kind, kind.other()]
            .into_iter()
            .find(|owner| self.store(*owner).is_known_key(handle))
        {
            error!(handle = %handle, path = %path, store = %owner, "Unable to recover from unknown registry key handle");
            return Err(SwitchError::RecoveryFailed { handle, path });
        }

        let Some(adopted) = target.open_key(&path) else {
            error!(handle = %handle, path = %path, store = %kind, "Unable to recover from unknown registry key handle");
            return Err(SwitchError::RecoveryFailed { handle, path });
        };
        if let Err(err) = target.add_alias(adopted, handle) {
            error!(handle = %handle, path = %path, store = %kind, error = %err, "Unable to recover from unknown registry key handle");
            if let Err(err) = target.close_key(adopted) {
                debug!(handle = %adopted, error = %err, "recovery binding already released");
            }
            return Err(SwitchError::RecoveryFailed { handle, path });
        }

        // The adopted handle now owns the key; the host's handle is redundant.
        self.host.close_handle(raw);
        Ok(kind)
    }

    // ========== Policy ==========

    /// Store that services `path` when no binding decides it.
    ///
    /// Only `Transparent` goes to the transparent store. `TransparentRead`
    /// and `VirtualWithFallback` stay with the virtual store, which handles
    /// their read-through itself.
    pub fn default_store_for(&self, path: Option<&KeyPath>) -> Result<StoreKind, SwitchError> {
        Ok(store_for_type(self.virtualization_type(path)?))
    }

    /// Set the request's virtualization type from its path and pick the
    /// matching default store.
    fn assign_default_store(&self, request: &mut RegistryRequest) -> Result<StoreKind, SwitchError> {
        let virtualization = self.virtualization_type(request.path())?;
        request.set_virtualization_type(virtualization);
        Ok(store_for_type(virtualization))
    }

    /// Virtualization type for `path`.
    ///
    /// A missing path is `Virtual`. Otherwise the deepest matching rule
    /// decides, and without one the hive's fallback does.
    pub fn virtualization_type(
        &self,
        path: Option<&KeyPath>,
    ) -> Result<VirtualizationType, SwitchError> {
        let Some(path) = path else {
            return Ok(VirtualizationType::Virtual);
        };
        match self.rules.has_rule(path) {
            Some(virtualization) => Ok(virtualization),
            None => fallback_virtualization_type(path),
        }
    }
}

fn store_for_type(virtualization: VirtualizationType) -> StoreKind {
    if virtualization == VirtualizationType::Transparent {
        StoreKind::Transparent
    } else {
        StoreKind::Virtual
    }
}

/// Hive-keyed default policy for paths no rule covers.
fn fallback_virtualization_type(path: &KeyPath) -> Result<VirtualizationType, SwitchError> {
    error!(path = %path, "Falling back to default rules, no rule specified");
    match path.hive() {
        Some(Hive::Users | Hive::CurrentUser) => Ok(VirtualizationType::VirtualWithFallback),
        Some(Hive::CurrentConfig | Hive::LocalMachine | Hive::ClassesRoot) => {
            Ok(VirtualizationType::TransparentRead)
        }
        Some(Hive::PerformanceData | Hive::DynData) => Ok(VirtualizationType::Transparent),
        None => {
            error!(path = %path, "Can't determine required virtualization for unknown hive");
            Err(SwitchError::UncoveredHive(path.clone()))
        }
    }
}
