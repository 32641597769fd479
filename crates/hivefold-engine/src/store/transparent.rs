//! Pass-through store backed by the host registry.
//!
//! The host registry is the source of truth for every key and value. This
//! store only keeps the handle table, so the switch can treat it the same
//! way as the virtual store.
//!
//! There is no use counter per path: every successful open binds a fresh
//! handle, and closing one handle never affects another handle bound to the
//! same key.

use std::sync::Arc;

use hivefold_core::{CreationDisposition, Handle, Hive, KeyPath, RegistryValue, StoreError};
use hivefold_host::{HostError, HostRegistry};
use tracing::{debug, warn};

use super::{HandleIndex, KeyTable, RegistryStore, StoreKind};

/// Store whose keys and values live in the host registry.
pub struct TransparentRegistry {
    host: Arc<dyn HostRegistry>,
    table: KeyTable,
}

impl TransparentRegistry {
    /// Create an empty store drawing handles from `index`.
    pub fn new(index: Arc<HandleIndex>, host: Arc<dyn HostRegistry>) -> Self {
        Self {
            host,
            table: KeyTable::new(index),
        }
    }

    /// Path bound to `handle`, or `InvalidHandle`.
    fn bound_path(&self, handle: Handle) -> Result<KeyPath, StoreError> {
        self.table.path_of(handle).ok_or(StoreError::InvalidHandle)
    }
}

/// Map a host failure into the store taxonomy. Only a missing key or value
/// survives as `NotFound`.
fn map_host_error(err: HostError) -> StoreError {
    match err {
        HostError::NotFound => StoreError::NotFound,
        HostError::AccessDenied | HostError::Platform(_) => StoreError::AccessDenied,
    }
}

impl RegistryStore for TransparentRegistry {
    fn kind(&self) -> StoreKind {
        StoreKind::Transparent
    }

    fn table(&self) -> &KeyTable {
        &self.table
    }

    fn open_key(&self, path: &KeyPath) -> Option<Handle> {
        if !self.host.key_exists(path) {
            debug!(path = %path, "host key does not exist");
            return None;
        }
        Some(self.table.bind(path.clone()))
    }

    fn create_key(&self, path: &KeyPath) -> Result<(Handle, CreationDisposition), StoreError> {
        let (raw, disposition) = self.host.create_key(path).map_err(|err| {
            warn!(path = %path, error = %err, "host refused key creation");
            StoreError::AccessDenied
        })?;
        // Only the path is kept; the host handle is not needed past creation.
        self.host.close_handle(raw);
        let handle = self.table.bind(path.clone());
        Ok((handle, disposition))
    }

    fn delete_key(&self, handle: Handle) -> Result<(), StoreError> {
        if Hive::is_hive_handle(handle) {
            return Err(StoreError::AccessDenied);
        }
        let path = self.bound_path(handle)?;
        let Some((parent, leaf)) = path.split_leaf() else {
            return Err(StoreError::AccessDenied);
        };

        // The subtree is removed through the parent, which must open writable.
        let Some(raw_parent) = self.host.open_key(&parent, true) else {
            if self.host.key_exists(&parent) {
                warn!(handle = %handle, parent = %parent, "host refused writable parent open");
                return Err(StoreError::AccessDenied);
            }
            debug!(handle = %handle, parent = %parent, "host parent key absent, dropping binding");
            self.table.remove_entry(handle);
            return Err(StoreError::NotFound);
        };
        let deleted = self.host.delete_subtree(&parent, leaf);
        self.host.close_handle(raw_parent);

        match deleted {
            Ok(()) => {
                // The binding may have been closed while the host call ran.
                self.table
                    .remove_entry(handle)
                    .map(|_| ())
                    .ok_or(StoreError::AccessDenied)
            }
            Err(HostError::NotFound) => {
                debug!(handle = %handle, path = %path, "host key already absent, dropping binding");
                self.table.remove_entry(handle);
                Err(StoreError::NotFound)
            }
            Err(err) => {
                warn!(handle = %handle, path = %path, error = %err, "host refused key deletion");
                Err(StoreError::AccessDenied)
            }
        }
    }

    fn query_value(&self, handle: Handle, name: &str) -> Result<RegistryValue, StoreError> {
        let path = self.bound_path(handle)?;
        self.host.query_value(&path, name).map_err(map_host_error)
    }

    fn set_value(&self, handle: Handle, value: RegistryValue) -> Result<(), StoreError> {
        let path = self.bound_path(handle)?;
        self.host.set_value(&path, &value).map_err(|err| {
            warn!(path = %path, value = %value.name, error = %err, "host refused value write");
            StoreError::AccessDenied
        })
    }

    fn delete_value(&self, handle: Handle, name: &str) -> Result<(), StoreError> {
        let path = self.bound_path(handle)?;
        self.host.delete_value(&path, name).map_err(map_host_error)
    }
}
