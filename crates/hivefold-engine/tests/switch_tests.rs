//! Routing, fallback and recovery through an assembled engine.

mod common;

use common::{capture_logs, count_at, harness, harness_with, path};
use hivefold_core::{Handle, Hive, Rule, VirtualizationType};
use hivefold_engine::{EngineConfig, RegistryRequest, RegistryStore, StoreKind, SwitchError};
use hivefold_host_mock::RAW_HANDLE_BASE;
use proptest::prelude::*;
use tracing::Level;

#[test]
fn test_per_user_path_without_rule_falls_back() {
    let h = harness();
    let switch = h.engine.switch();

    let (result, events) =
        capture_logs(|| switch.virtualization_type(Some(&path("HKCU\\Software\\App"))));
    assert_eq!(result, Ok(VirtualizationType::VirtualWithFallback));
    assert_eq!(count_at(&events, Level::ERROR, "Falling back to default rules"), 1);
}

#[test]
fn test_fallback_policy_by_hive() {
    let h = harness();
    let switch = h.engine.switch();
    for (raw, expected) in [
        ("HKU\\S-1-5-21\\Software", VirtualizationType::VirtualWithFallback),
        ("HKLM\\Software\\Vendor", VirtualizationType::TransparentRead),
        ("HKPD\\Global", VirtualizationType::Transparent),
    ] {
        assert_eq!(switch.virtualization_type(Some(&path(raw))), Ok(expected));
    }
}

#[test]
fn test_rule_suppresses_fallback_log() {
    let config = EngineConfig {
        rules: vec![Rule::new(path("HKCU\\Software"), VirtualizationType::Virtual)],
        ..Default::default()
    };
    let h = harness_with(&config);
    let switch = h.engine.switch();

    let (result, events) =
        capture_logs(|| switch.virtualization_type(Some(&path("HKCU\\Software\\App"))));
    assert_eq!(result, Ok(VirtualizationType::Virtual));
    assert_eq!(count_at(&events, Level::ERROR, "Falling back"), 0);
}

#[test]
fn test_performance_data_root_routes_transparent() {
    let h = harness();
    let mut request = RegistryRequest::new(Hive::PerformanceData.handle());
    let kind = h.engine.switch().resolve(&mut request, true).unwrap();
    assert_eq!(kind, StoreKind::Transparent);
    assert_eq!(request.virtualization_type(), Some(VirtualizationType::Transparent));
    assert_eq!(request.path(), Some(&path("HKEY_PERFORMANCE_DATA")));
}

#[test]
fn test_repeated_opens_resolve_independently() {
    let h = harness();
    h.host.insert_key("HKLM\\Software\\Vendor\\App");
    let store = h.engine.switch().transparent_store();

    let first = store.open_key(&path("HKLM\\Software\\Vendor\\App")).unwrap();
    let second = store.open_key(&path("HKLM\\Software\\Vendor\\App")).unwrap();
    assert_ne!(first, second);

    for handle in [first, second] {
        let mut request = RegistryRequest::new(handle);
        assert_eq!(
            h.engine.switch().resolve(&mut request, false),
            Ok(StoreKind::Transparent)
        );
        assert_eq!(request.path(), Some(&path("HKLM\\Software\\Vendor\\App")));
    }
}

#[test]
fn test_unresolvable_handle_fails_recovery() {
    let h = harness();
    let stale = Handle(0x0f00_1234);

    let (result, events) = capture_logs(|| {
        let mut request = RegistryRequest::new(stale);
        let result = h.engine.switch().resolve(&mut request, true);
        (result, request)
    });
    let (result, request) = result;
    assert_eq!(result, Err(SwitchError::UnknownHandle(stale)));
    assert!(!request.is_resolved());
    assert_eq!(count_at(&events, Level::ERROR, "Unknown registry key handle"), 1);
    assert_eq!(count_at(&events, Level::WARN, "Recovering"), 0);
    assert!(h.engine.check_invariants().is_empty());
}

#[test]
fn test_recovered_handle_aliases_new_binding() {
    let h = harness();
    let raw = h.host.open_raw("HKPD\\Global\\Counters");
    let leaked = Handle(raw.0);

    let (kind, events) = capture_logs(|| {
        let mut request = RegistryRequest::new(leaked);
        h.engine.switch().resolve(&mut request, true)
    });
    assert_eq!(kind, Ok(StoreKind::Transparent));
    assert_eq!(count_at(&events, Level::WARN, "Recovering"), 1);
    assert!(!h.host.is_handle_open(raw));

    let snapshot = h.engine.switch().transparent_store().snapshot();
    assert_eq!(snapshot.entries.len(), 1);
    let (issued, _) = snapshot.entries[0].clone();
    assert_eq!(snapshot.aliases, vec![(leaked, issued)]);

    for handle in [leaked, issued] {
        let mut request = RegistryRequest::new(handle);
        assert_eq!(
            h.engine.switch().resolve(&mut request, false),
            Ok(StoreKind::Transparent)
        );
        assert_eq!(request.path(), Some(&path("HKPD\\Global\\Counters")));
    }
    assert!(h.engine.check_invariants().is_empty());
}

#[test]
fn test_closing_recovered_entry_drops_alias() {
    let h = harness();
    let raw = h.host.open_raw("HKPD\\Global");
    let leaked = Handle(raw.0);
    let mut request = RegistryRequest::new(leaked);
    h.engine.switch().resolve(&mut request, true).unwrap();

    let store = h.engine.switch().transparent_store();
    let (issued, _) = store.snapshot().entries[0].clone();
    store.close_key(issued).unwrap();
    assert!(!store.is_known_key(leaked));

    let mut request = RegistryRequest::new(leaked);
    assert_eq!(
        h.engine.switch().resolve(&mut request, false),
        Err(SwitchError::UnknownHandle(leaked))
    );
}

#[test]
fn test_generated_handles_step_over_recovered_value() {
    let config = EngineConfig {
        handle_base: RAW_HANDLE_BASE - 1,
        ..EngineConfig::default()
    };
    let h = harness_with(&config);
    let raw = h.host.open_raw("HKPD\\Counters");
    let leaked = Handle(raw.0);
    let mut request = RegistryRequest::new(leaked);
    assert_eq!(
        h.engine.switch().resolve(&mut request, true),
        Ok(StoreKind::Transparent)
    );

    let (created, _) = h
        .engine
        .switch()
        .virtual_store()
        .create_key(&path("HKCU\\Software\\App"))
        .unwrap();
    assert_ne!(created, leaked);
    assert!(!h.engine.switch().virtual_store().is_known_key(leaked));
    assert!(h.engine.handles().is_adopted(leaked));
    assert!(h.engine.check_invariants().is_empty());

    // Once the alias is gone its value is free again.
    h.engine.switch().transparent_store().close_key(leaked).unwrap();
    assert!(!h.engine.handles().is_adopted(leaked));
}

#[test]
fn test_recovery_never_binds_handle_across_stores() {
    let config = EngineConfig {
        handle_base: RAW_HANDLE_BASE,
        ..EngineConfig::default()
    };
    let h = harness_with(&config);
    let (created, _) = h
        .engine
        .switch()
        .virtual_store()
        .create_key(&path("HKCU\\Software\\App"))
        .unwrap();
    let raw = h.host.open_raw("HKPD\\Counters");
    assert_eq!(created, Handle(raw.0));

    let (result, events) = capture_logs(|| {
        let mut request = RegistryRequest::with_path(created, path("HKPD\\Counters"));
        h.engine.switch().resolve(&mut request, true)
    });
    assert!(matches!(result, Err(SwitchError::RecoveryFailed { .. })));
    assert_eq!(count_at(&events, Level::ERROR, "Unable to recover"), 1);
    assert!(!h.engine.switch().transparent_store().is_known_key(created));
    assert!(h.engine.check_invariants().is_empty());
}

#[test]
fn test_uncovered_hive_is_fatal() {
    let h = harness();
    let err = h
        .engine
        .switch()
        .default_store_for(Some(&path("HKEY_BOGUS\\Software")))
        .unwrap_err();
    assert!(err.is_fatal());
}

proptest! {
    #[test]
    fn prop_stores_never_share_handles(ops in prop::collection::vec((any::<bool>(), 0usize..4), 1..40)) {
        let h = harness();
        h.host.insert_key("HKLM\\Software\\Vendor");
        let switch = h.engine.switch();
        let names = ["A", "B", "C", "D"];

        for (transparent, name) in ops {
            let key = path("HKLM\\Software\\Vendor").join(names[name]);
            if transparent {
                switch.transparent_store().create_key(&key).unwrap();
            } else {
                switch.virtual_store().create_key(&key).unwrap();
            }
        }

        for handle in switch.virtual_store().snapshot().handles() {
            prop_assert!(!switch.transparent_store().is_known_key(handle));
        }
        for handle in switch.transparent_store().snapshot().handles() {
            prop_assert!(!switch.virtual_store().is_known_key(handle));
        }
        prop_assert!(h.engine.check_invariants().is_empty());
    }
}
