//! API hook management.
//!
//! The native interception mechanism lives outside this crate and is reached
//! through [`HookInstaller`]. This module decides *what* gets hooked
//! ([`HookProvider`]), owns the process-wide [`HookManager`], and tracks
//! which threads must bypass the hooks ([`ExclusionList`]) so the engine's
//! own host calls are never intercepted again.

mod exclusion;
mod manager;
mod provider;

pub use exclusion::{ExclusionGuard, ExclusionList, ExclusionListener};
pub use manager::HookManager;
pub use provider::{HookInstaller, HookProvider, HookSpec, RegistryHookProvider};

/// Errors from hook management.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// A live [`HookManager`] already exists in this process
    #[error("there is already a running hook manager for the current process")]
    AlreadyInstantiated,

    /// The interception mechanism refused an entry point
    #[error("failed to hook {entry_point}: {reason}")]
    InstallFailed {
        /// `module!function` of the refused entry point
        entry_point: String,
        /// Installer-supplied detail
        reason: String,
    },
}
