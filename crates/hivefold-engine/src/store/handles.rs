//! Shared handle index.
//!
//! Handles reach a store two ways: generated for a fresh binding, or
//! adopted from the host when the switch recovers a handle it never issued.
//! Both come from the same `u32` space, so the generator must step over any
//! adopted value that is still bound.

use std::collections::BTreeSet;

use hivefold_core::{Handle, HandleGenerator, Hive, DEFAULT_HANDLE_BASE};
use parking_lot::Mutex;
use tracing::debug;

/// Generator plus the set of adopted handles it must not issue.
#[derive(Debug)]
pub struct HandleIndex {
    generator: HandleGenerator,
    /// Adopted values currently bound as aliases
    adopted: Mutex<BTreeSet<Handle>>,
}

impl HandleIndex {
    /// Create an index whose generator starts at `base`.
    pub fn new(base: u32) -> Self {
        Self {
            generator: HandleGenerator::new(base),
            adopted: Mutex::new(BTreeSet::new()),
        }
    }

    /// The underlying generator
    pub fn generator(&self) -> &HandleGenerator {
        &self.generator
    }

    /// Issue a handle that is neither reserved for a hive nor adopted.
    pub fn issue(&self) -> Handle {
        let adopted = self.adopted.lock();
        loop {
            let handle = self.generator.next();
            if !adopted.contains(&handle) {
                return handle;
            }
            debug!(handle = %handle, "skipping adopted handle");
        }
    }

    /// Reserve `handle` as adopted.
    ///
    /// Returns `false` if it is already adopted or is a hive-root handle.
    pub fn adopt(&self, handle: Handle) -> bool {
        if Hive::is_hive_handle(handle) {
            return false;
        }
        self.adopted.lock().insert(handle)
    }

    /// Release an adopted handle.
    pub fn release(&self, handle: Handle) {
        self.adopted.lock().remove(&handle);
    }

    /// Check if `handle` is currently adopted
    pub fn is_adopted(&self, handle: Handle) -> bool {
        self.adopted.lock().contains(&handle)
    }

    /// Number of adopted handles
    pub fn adopted_count(&self) -> usize {
        self.adopted.lock().len()
    }
}

impl Default for HandleIndex {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLE_BASE)
    }
}
