//! Engine configuration.
//!
//! Loaded from JSON:
//!
//! ```json
//! {
//!   "handle_base": 256,
//!   "rules": [
//!     { "path": "HKCU\\Software\\Vendor", "virtualization": "Transparent" }
//!   ],
//!   "virtual_keys": [
//!     { "path": "HKLM\\Software\\Vendor\\App",
//!       "values": [{ "name": "Version", "data": [3, 0, 0, 0], "value_type": "DWord" }] }
//!   ]
//! }
//! ```
//!
//! Every field is optional.

use std::collections::BTreeSet;

use hivefold_core::{Handle, Hive, Rule, RuleCollection, DEFAULT_HANDLE_BASE};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::VirtualKeyRecord;

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// First handle value the generator issues
    pub handle_base: u32,

    /// Virtualization rules, consulted before the hive fallback policy
    pub rules: Vec<Rule>,

    /// Keys the virtual store starts with
    pub virtual_keys: Vec<VirtualKeyRecord>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handle_base: DEFAULT_HANDLE_BASE,
            rules: Vec::new(),
            virtual_keys: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration is usable.
    ///
    /// The handle base must be non-zero and outside the hive range, and no
    /// virtual key may be declared twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handle_base == 0 || Hive::is_hive_handle(Handle(self.handle_base)) {
            return Err(ConfigError::InvalidHandleBase(self.handle_base));
        }

        let mut seen = BTreeSet::new();
        for record in &self.virtual_keys {
            if !seen.insert(&record.path) {
                return Err(ConfigError::DuplicateVirtualKey(record.path.clone()));
            }
        }
        Ok(())
    }

    /// The rules as a lookup collection.
    pub fn rule_collection(&self) -> RuleCollection {
        self.rules.iter().cloned().collect()
    }
}
