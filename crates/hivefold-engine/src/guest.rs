//! Guest-facing registry facade.
//!
//! Interception handlers call [`GuestRegistry`] with the handle and
//! arguments the guest passed. Each call runs with the calling thread
//! excluded from the hooks, so host registry calls made while servicing it
//! reach the real registry.

use std::sync::Arc;

use hivefold_core::{CreationDisposition, Handle, Hive, KeyPath, RegistryValue, StoreError};
use tracing::{debug, error};

use crate::error::SwitchError;
use crate::hooking::ExclusionList;
use crate::request::RegistryRequest;
use crate::store::RegistryStore;
use crate::switch::RegistrySwitch;

/// Entry point for intercepted registry calls.
pub struct GuestRegistry {
    switch: Arc<RegistrySwitch>,
    exclusions: Arc<ExclusionList>,
}

impl GuestRegistry {
    /// Create a facade over `switch`.
    pub fn new(switch: Arc<RegistrySwitch>, exclusions: Arc<ExclusionList>) -> Self {
        Self { switch, exclusions }
    }

    /// The switch behind this facade
    pub fn switch(&self) -> &Arc<RegistrySwitch> {
        &self.switch
    }

    // ========== Keys ==========

    /// Open `sub_key` beneath `parent`.
    ///
    /// An empty `sub_key` opens a new handle to `parent` itself. The store is
    /// chosen by the joined path, not by the store owning `parent`.
    pub fn open_key(&self, parent: Handle, sub_key: &str) -> Result<Handle, StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        let path = self.resolve_sub_key(parent, sub_key)?;
        let store = self.default_store(&path)?;
        store.open_key(&path).ok_or(StoreError::NotFound)
    }

    /// Create or open `sub_key` beneath `parent`.
    pub fn create_key(
        &self,
        parent: Handle,
        sub_key: &str,
    ) -> Result<(Handle, CreationDisposition), StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        let path = self.resolve_sub_key(parent, sub_key)?;
        let store = self.default_store(&path)?;
        store.create_key(&path)
    }

    /// Release `handle`.
    ///
    /// Hive-root handles are never bound, so closing one always succeeds.
    /// Unknown handles are not recovered.
    pub fn close_key(&self, handle: Handle) -> Result<(), StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        if Hive::is_hive_handle(handle) {
            return Ok(());
        }
        let mut request = RegistryRequest::new(handle);
        let store = self.resolve(&mut request, false)?;
        store.close_key(handle)
    }

    /// Delete the key behind `handle`, subtree included.
    pub fn delete_key(&self, handle: Handle) -> Result<(), StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        let mut request = RegistryRequest::new(handle);
        let store = self.resolve(&mut request, true)?;
        store.delete_key(handle)
    }

    // ========== Values ==========

    /// Read the value `name` from the key behind `handle`.
    pub fn query_value(&self, handle: Handle, name: &str) -> Result<RegistryValue, StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        self.with_key(handle, |store, handle| store.query_value(handle, name))
    }

    /// Write `value` to the key behind `handle`.
    pub fn set_value(&self, handle: Handle, value: RegistryValue) -> Result<(), StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        self.with_key(handle, |store, handle| store.set_value(handle, value))
    }

    /// Delete the value `name` from the key behind `handle`.
    pub fn delete_value(&self, handle: Handle, name: &str) -> Result<(), StoreError> {
        let _guard = self.exclusions.exclude_current_thread();
        self.with_key(handle, |store, handle| store.delete_value(handle, name))
    }

    // ========== Resolution ==========

    fn resolve(
        &self,
        request: &mut RegistryRequest,
        allow_recovery: bool,
    ) -> Result<&dyn RegistryStore, StoreError> {
        self.switch
            .resolve_store(request, allow_recovery)
            .map_err(switch_failure)
    }

    fn default_store(&self, path: &KeyPath) -> Result<&dyn RegistryStore, StoreError> {
        let kind = self
            .switch
            .default_store_for(Some(path))
            .map_err(switch_failure)?;
        Ok(self.switch.store(kind))
    }

    fn resolve_sub_key(&self, parent: Handle, sub_key: &str) -> Result<KeyPath, StoreError> {
        if sub_key.contains('\0') {
            return Err(StoreError::NotFound);
        }
        let mut request = RegistryRequest::new(parent);
        self.resolve(&mut request, true)?;
        let parent_path = request.path().ok_or(StoreError::InvalidHandle)?;
        Ok(parent_path.join(sub_key))
    }

    /// Run `op` against the store owning `handle`.
    ///
    /// A hive-root handle gets a temporary binding in its default store for
    /// the duration of `op`.
    fn with_key<T>(
        &self,
        handle: Handle,
        op: impl FnOnce(&dyn RegistryStore, Handle) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut request = RegistryRequest::new(handle);
        let store = self.resolve(&mut request, true)?;
        if !Hive::is_hive_handle(handle) {
            return op(store, handle);
        }

        let path = request.path().ok_or(StoreError::InvalidHandle)?;
        let temporary = store.open_key(path).ok_or(StoreError::NotFound)?;
        let result = op(store, temporary);
        if let Err(err) = store.close_key(temporary) {
            debug!(handle = %temporary, error = %err, "temporary hive binding already released");
        }
        result
    }
}

fn switch_failure(err: SwitchError) -> StoreError {
    if err.is_fatal() {
        error!(error = %err, "registry configuration does not cover request");
        StoreError::AccessDenied
    } else {
        StoreError::InvalidHandle
    }
}
