//! The process-wide hook manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{ExclusionList, HookError, HookInstaller, HookProvider};

/// Set while a [`HookManager`] is alive.
static INSTANTIATED: AtomicBool = AtomicBool::new(false);

/// Owns the hook providers and the thread exclusion list.
///
/// At most one manager exists per process; dropping it allows a new one.
pub struct HookManager {
    exclusions: Arc<ExclusionList>,
    providers: Mutex<Vec<Arc<dyn HookProvider>>>,
}

impl HookManager {
    /// Claim the process-wide manager with a fresh exclusion list.
    pub fn new() -> Result<Self, HookError> {
        Self::with_exclusions(Arc::new(ExclusionList::new()))
    }

    /// Claim the process-wide manager, sharing `exclusions`.
    pub fn with_exclusions(exclusions: Arc<ExclusionList>) -> Result<Self, HookError> {
        INSTANTIATED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HookError::AlreadyInstantiated)?;
        Ok(Self {
            exclusions,
            providers: Mutex::new(Vec::new()),
        })
    }

    /// The thread exclusion list consulted by installed hooks
    pub fn exclusions(&self) -> &Arc<ExclusionList> {
        &self.exclusions
    }

    /// Register `provider`.
    ///
    /// Returns `false` if this exact provider instance is already registered.
    pub fn register_provider(&self, provider: Arc<dyn HookProvider>) -> bool {
        let mut providers = self.providers.lock();
        if providers.iter().any(|known| same_provider(known, &provider)) {
            return false;
        }
        providers.push(provider);
        true
    }

    /// Number of registered providers
    pub fn provider_count(&self) -> usize {
        self.providers.lock().len()
    }

    /// Install every provider's hooks, in registration order.
    ///
    /// The calling thread is excluded while installing. Returns the total
    /// number of hooks installed.
    pub fn install_hooks(&self, installer: &mut dyn HookInstaller) -> Result<usize, HookError> {
        let _guard = self.exclusions.exclude_current_thread();
        debug!("installing API hooks");
        let providers = self.providers.lock();
        let mut installed = 0;
        for provider in providers.iter() {
            installed += provider.install_hooks(installer)?;
        }
        debug!(installed, "finished installing API hooks");
        Ok(installed)
    }
}

impl Drop for HookManager {
    fn drop(&mut self) {
        INSTANTIATED.store(false, Ordering::Release);
    }
}

fn same_provider(a: &Arc<dyn HookProvider>, b: &Arc<dyn HookProvider>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
