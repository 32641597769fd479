//! Backing stores.
//!
//! A store owns a set of handle→path bindings and performs the primitive
//! key and value operations against its medium. The switch treats every
//! store through the [`RegistryStore`] trait.

mod handles;
mod table;
mod transparent;
mod virtual_registry;

use std::fmt;

use hivefold_core::{CreationDisposition, Handle, KeyPath, RegistryValue, StoreError};

use crate::request::RegistryRequest;

pub use handles::HandleIndex;
pub use table::{KeyTable, TableSnapshot};
pub use transparent::TransparentRegistry;
pub use virtual_registry::{VirtualKeyRecord, VirtualRegistry};

/// Which store a request was routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The in-memory virtual store
    Virtual,
    /// The pass-through store backed by the host registry
    Transparent,
}

impl StoreKind {
    /// The opposite store.
    pub fn other(self) -> Self {
        match self {
            StoreKind::Virtual => StoreKind::Transparent,
            StoreKind::Transparent => StoreKind::Virtual,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Virtual => f.write_str("virtual"),
            StoreKind::Transparent => f.write_str("transparent"),
        }
    }
}

/// Backing store interface.
///
/// Membership, alias and close bookkeeping are provided on top of
/// [`RegistryStore::table`]; implementations supply the medium-specific
/// primitives.
pub trait RegistryStore: Send + Sync {
    /// Which variant this store is.
    fn kind(&self) -> StoreKind;

    /// The handle table this store owns.
    fn table(&self) -> &KeyTable;

    // ========== Membership ==========

    /// Check if `handle` is bound in this store, as an entry or an alias.
    fn is_known_key(&self, handle: Handle) -> bool {
        self.table().contains(handle)
    }

    /// Check if this store owns the request's handle.
    ///
    /// When the request already carries a resolved path, the bound path must
    /// match it as well.
    fn is_known_request(&self, request: &RegistryRequest) -> bool {
        match (self.table().path_of(request.handle()), request.path()) {
            (Some(bound), Some(expected)) => bound == *expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Path bound to `handle`. Aliases yield their entry's path.
    fn key_path(&self, handle: Handle) -> Option<KeyPath> {
        self.table().path_of(handle)
    }

    // ========== Keys ==========

    /// Bind a fresh handle to `path` if the key exists in this medium.
    fn open_key(&self, path: &KeyPath) -> Option<Handle>;

    /// Ensure `path` exists in this medium, then bind a fresh handle to it.
    fn create_key(&self, path: &KeyPath) -> Result<(Handle, CreationDisposition), StoreError>;

    /// Delete the key behind `handle` and release the binding.
    fn delete_key(&self, handle: Handle) -> Result<(), StoreError>;

    /// Release a binding without touching the medium.
    ///
    /// Closing an alias releases only the alias; closing an entry releases
    /// the entry and every alias pointing at it.
    fn close_key(&self, handle: Handle) -> Result<(), StoreError> {
        self.table()
            .close(handle)
            .map(|_| ())
            .ok_or(StoreError::InvalidHandle)
    }

    // ========== Values ==========

    /// Read the value `name` from the key behind `handle`.
    fn query_value(&self, handle: Handle, name: &str) -> Result<RegistryValue, StoreError>;

    /// Write `value` to the key behind `handle`.
    fn set_value(&self, handle: Handle, value: RegistryValue) -> Result<(), StoreError>;

    /// Delete the value `name` from the key behind `handle`.
    fn delete_value(&self, handle: Handle, name: &str) -> Result<(), StoreError>;

    // ========== Aliases ==========

    /// Make `alias` resolve to the same entry as `handle`.
    fn add_alias(&self, handle: Handle, alias: Handle) -> Result<(), StoreError> {
        self.table().add_alias(handle, alias)
    }

    /// Copy of the current bindings.
    fn snapshot(&self) -> TableSnapshot {
        self.table().snapshot()
    }
}
