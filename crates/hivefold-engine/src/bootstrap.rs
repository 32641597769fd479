//! Engine assembly.
//!
//! Wires one handle index, both stores, the rules and the host bridge
//! into a switch and a guest facade:
//!
//! ```text
//! EngineConfig ──┬─> HandleIndex     (handle_base)
//!                ├─> VirtualRegistry (virtual_keys)
//!                ├─> RuleCollection  (rules)
//!                └─> RegistrySwitch ──> GuestRegistry
//! ```

use std::sync::Arc;

use hivefold_core::HandleGenerator;
use hivefold_host::HostRegistry;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::guest::GuestRegistry;
use crate::hooking::ExclusionList;
use crate::invariants::{check_all_invariants, InvariantViolation};
use crate::store::{HandleIndex, TransparentRegistry, VirtualRegistry};
use crate::switch::RegistrySwitch;

/// A fully assembled engine.
pub struct Engine {
    handles: Arc<HandleIndex>,
    switch: Arc<RegistrySwitch>,
    guest: GuestRegistry,
}

impl Engine {
    /// The handle index both stores draw from
    pub fn handles(&self) -> &Arc<HandleIndex> {
        &self.handles
    }

    /// The generator behind [`Engine::handles`]
    pub fn generator(&self) -> &HandleGenerator {
        self.handles.generator()
    }

    /// The routing switch
    pub fn switch(&self) -> &Arc<RegistrySwitch> {
        &self.switch
    }

    /// The guest-facing facade
    pub fn guest(&self) -> &GuestRegistry {
        &self.guest
    }

    /// Check every runtime invariant against the current bindings.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        check_all_invariants(&self.switch, &self.handles)
    }
}

/// Build the stores and switch described by `config`.
///
/// Does not validate `config`; see [`bootstrap`].
pub fn build_switch(
    config: &EngineConfig,
    handles: Arc<HandleIndex>,
    host: Arc<dyn HostRegistry>,
) -> RegistrySwitch {
    let virtual_store = VirtualRegistry::with_keys(handles.clone(), config.virtual_keys.clone());
    let transparent_store = TransparentRegistry::new(handles, host.clone());
    RegistrySwitch::new(
        Arc::new(virtual_store),
        Arc::new(transparent_store),
        config.rule_collection(),
        host,
    )
}

/// Validate `config` and assemble an engine over `host`.
pub fn bootstrap(
    config: &EngineConfig,
    host: Arc<dyn HostRegistry>,
    exclusions: Arc<ExclusionList>,
) -> Result<Engine, ConfigError> {
    config.validate()?;

    let handles = Arc::new(HandleIndex::new(config.handle_base));
    let switch = Arc::new(build_switch(config, handles.clone(), host));
    let guest = GuestRegistry::new(switch.clone(), exclusions);

    info!(
        handle_base = handles.generator().base(),
        rules = config.rules.len(),
        virtual_keys = config.virtual_keys.len(),
        "registry engine ready"
    );

    Ok(Engine {
        handles,
        switch,
        guest,
    })
}
