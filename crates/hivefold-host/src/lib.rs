//! Host Registry Bridge trait for hivefold
//!
//! This crate defines the only surface through which hivefold touches the
//! real OS registry. The engine never calls a platform API directly; it goes
//! through a [`HostRegistry`] implementation supplied at start-up.
//!
//! # Implementations
//!
//! - **Windows**: thin wrapper over the `advapi32` registry API
//! - **Tests**: `hivefold-host-mock`, an in-memory simulated registry
//!
//! The bridge transacts by path rather than by handle. Raw handles only
//! appear where the guest obtained one behind the engine's back and the
//! engine needs to adopt it.

#![no_std]

extern crate alloc;

use core::fmt;

use hivefold_core::{CreationDisposition, KeyPath, RegistryValue};

/// A handle issued by the host registry itself.
///
/// These are never handed to the guest by hivefold; they appear when the
/// guest opened a key through a path the interception layer missed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle(pub u32);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Host Registry Bridge
///
/// Implementations provide platform-specific access to:
/// - Key existence, creation and subtree deletion
/// - Value query, write and deletion
/// - Reverse lookup of raw handles for recovery
///
/// Every method is synchronous and may block for as long as the host call
/// takes.
pub trait HostRegistry: Send + Sync {
    // === Keys ===

    /// Check if a key exists.
    fn key_exists(&self, path: &KeyPath) -> bool;

    /// Create a key (and any missing parents), or open it if present.
    ///
    /// # Returns
    /// * `Ok((RawHandle, CreationDisposition))` - Key is present, caller owns the handle
    /// * `Err(HostError::AccessDenied)` - Host refused the creation
    fn create_key(&self, path: &KeyPath) -> Result<(RawHandle, CreationDisposition), HostError>;

    /// Open an existing key.
    ///
    /// Returns `None` if the key does not exist or cannot be opened with
    /// the requested access.
    fn open_key(&self, path: &KeyPath, writable: bool) -> Option<RawHandle>;

    /// Delete `leaf` and everything beneath it from the key at `parent`.
    ///
    /// # Returns
    /// * `Ok(())` - Subtree removed
    /// * `Err(HostError::NotFound)` - `parent` or `leaf` does not exist
    /// * `Err(HostError::AccessDenied)` - Host refused the deletion
    fn delete_subtree(&self, parent: &KeyPath, leaf: &str) -> Result<(), HostError>;

    // === Values ===

    /// Read a value from the key at `path`.
    ///
    /// # Returns
    /// * `Ok(RegistryValue)` - Raw bytes and declared type
    /// * `Err(HostError::NotFound)` - Key or value does not exist
    fn query_value(&self, path: &KeyPath, name: &str) -> Result<RegistryValue, HostError>;

    /// Write a value to the key at `path`.
    fn set_value(&self, path: &KeyPath, value: &RegistryValue) -> Result<(), HostError>;

    /// Delete a value from the key at `path`.
    fn delete_value(&self, path: &KeyPath, name: &str) -> Result<(), HostError>;

    // === Raw handles ===

    /// Resolve a raw host handle to the path of the key it refers to.
    ///
    /// Returns `None` for stale or foreign handles.
    fn key_path_by_handle(&self, handle: RawHandle) -> Option<KeyPath>;

    /// Release a raw host handle.
    fn close_handle(&self, handle: RawHandle);
}

/// Errors from host registry operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Key or value does not exist
    #[error("not found")]
    NotFound,
    /// Host refused the operation
    #[error("access denied")]
    AccessDenied,
    /// Any other platform failure, with the platform's description
    #[error("host registry failure: {0}")]
    Platform(alloc::string::String),
}

impl HostError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound)
    }
}
