//! Hook providers and the installer seam.

use std::fmt;

use tracing::debug;

use super::HookError;

/// One native entry point to intercept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookSpec {
    /// Module exporting the entry point, e.g. `advapi32.dll`
    pub module: &'static str,
    /// Exported function name
    pub function: &'static str,
}

impl HookSpec {
    /// Create a spec for `module!function`.
    pub const fn new(module: &'static str, function: &'static str) -> Self {
        Self { module, function }
    }

    /// `module!function`, the form used in logs and errors.
    pub fn entry_point(&self) -> String {
        format!("{}!{}", self.module, self.function)
    }
}

impl fmt::Display for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.module, self.function)
    }
}

/// The native interception mechanism.
///
/// Implementations patch the entry point and route it to the matching
/// guest handler. Installed hooks start with no excluded threads.
pub trait HookInstaller {
    /// Install a hook on `spec`.
    fn install(&mut self, spec: &HookSpec) -> Result<(), HookError>;
}

/// A group of hooks installed together.
pub trait HookProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Entry points this provider intercepts.
    fn hooks(&self) -> Vec<HookSpec>;

    /// Install every hook through `installer`.
    ///
    /// Stops at the first refused entry point. Returns how many hooks were
    /// installed.
    fn install_hooks(&self, installer: &mut dyn HookInstaller) -> Result<usize, HookError> {
        let hooks = self.hooks();
        for spec in &hooks {
            installer.install(spec)?;
            debug!(provider = self.name(), entry_point = %spec, "hook installed");
        }
        Ok(hooks.len())
    }
}

const ADVAPI32: &str = "advapi32.dll";

/// Registry entry points routed to the guest registry facade.
const REGISTRY_HOOKS: [HookSpec; 7] = [
    HookSpec::new(ADVAPI32, "RegOpenKeyExW"),
    HookSpec::new(ADVAPI32, "RegCreateKeyExW"),
    HookSpec::new(ADVAPI32, "RegCloseKey"),
    HookSpec::new(ADVAPI32, "RegDeleteKeyW"),
    HookSpec::new(ADVAPI32, "RegQueryValueExW"),
    HookSpec::new(ADVAPI32, "RegSetValueExW"),
    HookSpec::new(ADVAPI32, "RegDeleteValueW"),
];

/// Provider for the registry API.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistryHookProvider;

impl HookProvider for RegistryHookProvider {
    fn name(&self) -> &str {
        "registry"
    }

    fn hooks(&self) -> Vec<HookSpec> {
        REGISTRY_HOOKS.to_vec()
    }
}
