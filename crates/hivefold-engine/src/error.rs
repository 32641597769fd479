//! Error types for the engine.

use hivefold_core::{Handle, KeyPath};

/// Reasons the switch could not pick a store for a request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SwitchError {
    /// Handle unknown to both stores, not a hive root, and not recoverable
    #[error("unknown registry key handle {0}")]
    UnknownHandle(Handle),

    /// The host resolved the handle but the target store could not adopt it
    #[error("unable to recover registry key handle {handle} => {path}")]
    RecoveryFailed {
        /// Handle the guest presented
        handle: Handle,
        /// Path the host resolved it to
        path: KeyPath,
    },

    /// No rule matched and the fallback policy has no entry for the hive
    #[error("can't determine required virtualization for \"{0}\"")]
    UncoveredHive(KeyPath),
}

impl SwitchError {
    /// Check if this is a configuration bug rather than a runtime fault.
    ///
    /// Fatal errors must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SwitchError::UncoveredHive(_))
    }
}

/// Errors loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed JSON or a field that failed to deserialize
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Handle base of zero or inside the reserved hive range
    #[error("handle base 0x{0:08x} is reserved")]
    InvalidHandleBase(u32),

    /// Two virtual key records name the same key
    #[error("virtual key {0} is declared more than once")]
    DuplicateVirtualKey(KeyPath),
}
