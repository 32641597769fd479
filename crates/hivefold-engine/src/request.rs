//! Registry requests flowing through the switch.

use hivefold_core::{Handle, KeyPath, VirtualizationType};

/// A single guest operation's addressing state.
///
/// The guest supplies the handle; the switch fills in the resolved path and
/// virtualization type. Nothing outside the engine writes the resolved
/// fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryRequest {
    handle: Handle,
    path: Option<KeyPath>,
    virtualization_type: Option<VirtualizationType>,
}

impl RegistryRequest {
    /// Create an unresolved request for `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            path: None,
            virtualization_type: None,
        }
    }

    /// Create a request that already expects `handle` to name `path`.
    ///
    /// Stores only claim such a request if their binding agrees.
    pub fn with_path(handle: Handle, path: KeyPath) -> Self {
        Self {
            handle,
            path: Some(path),
            virtualization_type: None,
        }
    }

    /// Handle presented by the guest
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Resolved key path, if resolution got that far
    pub fn path(&self) -> Option<&KeyPath> {
        self.path.as_ref()
    }

    /// Resolved virtualization type
    pub fn virtualization_type(&self) -> Option<VirtualizationType> {
        self.virtualization_type
    }

    /// Check if both resolved fields are set
    pub fn is_resolved(&self) -> bool {
        self.path.is_some() && self.virtualization_type.is_some()
    }

    pub(crate) fn set_path(&mut self, path: KeyPath) {
        self.path = Some(path);
    }

    pub(crate) fn set_virtualization_type(&mut self, virtualization_type: VirtualizationType) {
        self.virtualization_type = Some(virtualization_type);
    }

    /// Drop any partial resolution after a failure.
    pub(crate) fn clear_resolution(&mut self) {
        self.path = None;
        self.virtualization_type = None;
    }
}
