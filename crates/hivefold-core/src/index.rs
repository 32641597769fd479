//! Process-wide handle generator.
//!
//! Every backing store draws its handles from one shared generator so two
//! stores can never hand the guest the same value.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::hive::{HIVE_HANDLE_FIRST, HIVE_HANDLE_LAST};
use crate::types::Handle;

/// Default first handle value
pub const DEFAULT_HANDLE_BASE: u32 = 0x0000_0100;

/// Monotonic source of unique key handles.
///
/// Values increase strictly for the lifetime of the generator and skip the
/// reserved hive range. Exhausting the `u32` space is not handled.
#[derive(Debug)]
pub struct HandleGenerator {
    /// First value this generator hands out
    base: u32,
    /// Next candidate value
    next: AtomicU32,
}

impl HandleGenerator {
    /// Create a generator starting at `base`.
    ///
    /// A `base` inside the hive range starts just past it.
    pub fn new(base: u32) -> Self {
        let base = Self::skip_reserved(base);
        Self {
            base,
            next: AtomicU32::new(base),
        }
    }

    /// Issue the next handle.
    pub fn next(&self) -> Handle {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let value = Self::skip_reserved(current);
            let following = value.wrapping_add(1);
            match self.next.compare_exchange_weak(
                current,
                following,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Handle(value),
                Err(observed) => current = observed,
            }
        }
    }

    /// The value the next call to [`HandleGenerator::next`] will consider.
    pub fn peek(&self) -> u32 {
        Self::skip_reserved(self.next.load(Ordering::Acquire))
    }

    /// First value this generator issues.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Check whether `handle` lies in the range this generator has issued.
    pub fn has_issued(&self, handle: Handle) -> bool {
        handle.0 >= self.base && handle.0 < self.peek() && !Self::is_reserved(handle.0)
    }

    fn is_reserved(value: u32) -> bool {
        (HIVE_HANDLE_FIRST..=HIVE_HANDLE_LAST).contains(&value)
    }

    fn skip_reserved(value: u32) -> u32 {
        if Self::is_reserved(value) {
            HIVE_HANDLE_LAST + 1
        } else {
            value
        }
    }
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLE_BASE)
    }
}
