//! Loading configuration and bootstrapping from it.

mod common;

use std::sync::Arc;

use common::path;
use hivefold_core::{Handle, Hive, RegistryValue, VirtualizationType};
use hivefold_engine::{bootstrap, ConfigError, EngineConfig, ExclusionList, StoreKind};
use hivefold_host_mock::MockHostRegistry;

const CONFIG: &str = r#"{
    "handle_base": 4096,
    "rules": [
        { "path": "HKLM\\Software\\Vendor", "virtualization": "Transparent" },
        { "path": "HKCU\\Software\\Vendor\\App", "virtualization": "Virtual" }
    ],
    "virtual_keys": [
        { "path": "HKCU\\Software\\Vendor\\App",
          "values": [{ "name": "Version", "data": [3, 0, 0, 0], "value_type": "DWord" }] }
    ]
}"#;

#[test]
fn test_load_and_bootstrap() {
    let config = EngineConfig::from_json(CONFIG).unwrap();
    let engine = bootstrap(
        &config,
        Arc::new(MockHostRegistry::new()),
        Arc::new(ExclusionList::new()),
    )
    .unwrap();

    assert_eq!(engine.generator().base(), 4096);
    assert_eq!(
        engine
            .switch()
            .virtualization_type(Some(&path("HKLM\\Software\\Vendor\\Tool"))),
        Ok(VirtualizationType::Transparent)
    );
    assert_eq!(
        engine
            .switch()
            .default_store_for(Some(&path("HKLM\\Software\\Vendor\\Tool"))),
        Ok(StoreKind::Transparent)
    );

    let guest = engine.guest();
    let app = guest
        .open_key(Hive::CurrentUser.handle(), "Software\\Vendor\\App")
        .unwrap();
    assert_eq!(app, Handle(4096));
    assert_eq!(
        guest.query_value(app, "version"),
        Ok(RegistryValue::dword("Version", 3))
    );
}

#[test]
fn test_json_round_trip() {
    let config = EngineConfig::from_json(CONFIG).unwrap();
    let reloaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_bootstrap_validates() {
    let config = EngineConfig {
        handle_base: Hive::Users.handle().raw(),
        ..Default::default()
    };
    let result = bootstrap(
        &config,
        Arc::new(MockHostRegistry::new()),
        Arc::new(ExclusionList::new()),
    );
    assert!(matches!(result, Err(ConfigError::InvalidHandleBase(_))));
}

#[test]
fn test_bad_rule_path_is_parse_error() {
    let json = r#"{"rules": [{ "path": "", "virtualization": "Virtual" }]}"#;
    assert!(matches!(EngineConfig::from_json(json), Err(ConfigError::Parse(_))));
}
