//! Runtime-checkable invariants for the switch and its stores
//!
//! These should hold after every completed guest operation. Tests call
//! [`check_all_invariants`] after driving the engine; embedders can call it
//! from debug builds.
//!
//! # Invariants
//!
//! 1. **Store Exclusivity**: No handle is bound in both stores
//! 2. **Alias Integrity**: Every alias points at an entry of the same store
//! 3. **Handle Monotonicity**: Every entry handle was issued by the generator
//! 4. **Hive Range**: No entry handle lies in the reserved hive range
//! 5. **Alias Reservation**: Every alias is adopted in the handle index and
//!    no entry is

use std::collections::BTreeSet;

use hivefold_core::{Handle, Hive};

use crate::store::{HandleIndex, StoreKind, TableSnapshot};
use crate::switch::RegistrySwitch;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all switch invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(
    switch: &RegistrySwitch,
    handles: &HandleIndex,
) -> Vec<InvariantViolation> {
    let virtual_snapshot = switch.virtual_store().snapshot();
    let transparent_snapshot = switch.transparent_store().snapshot();

    let mut violations = Vec::new();
    violations.extend(check_store_exclusivity(&virtual_snapshot, &transparent_snapshot));
    for (kind, snapshot) in [
        (StoreKind::Virtual, &virtual_snapshot),
        (StoreKind::Transparent, &transparent_snapshot),
    ] {
        violations.extend(check_alias_integrity(kind, snapshot));
        violations.extend(check_handle_monotonicity(kind, snapshot, handles));
        violations.extend(check_hive_range(kind, snapshot));
        violations.extend(check_alias_reservation(kind, snapshot, handles));
    }
    violations
}

/// Invariant 1: No handle is bound in both stores
fn check_store_exclusivity(
    virtual_snapshot: &TableSnapshot,
    transparent_snapshot: &TableSnapshot,
) -> Vec<InvariantViolation> {
    let virtual_handles: BTreeSet<Handle> = virtual_snapshot.handles().collect();
    transparent_snapshot
        .handles()
        .filter(|handle| virtual_handles.contains(handle))
        .map(|handle| InvariantViolation {
            invariant: "store_exclusivity",
            description: format!("Handle {} is bound in both stores", handle),
        })
        .collect()
}

/// Invariant 2: Every alias points at an entry of the same store
fn check_alias_integrity(kind: StoreKind, snapshot: &TableSnapshot) -> Vec<InvariantViolation> {
    let entries: BTreeSet<Handle> = snapshot.entries.iter().map(|(handle, _)| *handle).collect();
    let mut violations = Vec::new();

    for (alias, target) in &snapshot.aliases {
        if entries.contains(alias) {
            violations.push(InvariantViolation {
                invariant: "alias_integrity",
                description: format!("Handle {} is both entry and alias in the {} store", alias, kind),
            });
        }
        if !entries.contains(target) {
            violations.push(InvariantViolation {
                invariant: "alias_integrity",
                description: format!(
                    "Alias {} in the {} store points at {}, which is not an entry",
                    alias, kind, target
                ),
            });
        }
    }

    violations
}

/// Invariant 3: Every entry handle was issued by the generator
fn check_handle_monotonicity(
    kind: StoreKind,
    snapshot: &TableSnapshot,
    handles: &HandleIndex,
) -> Vec<InvariantViolation> {
    let generator = handles.generator();
    snapshot
        .entries
        .iter()
        .filter(|(handle, _)| !generator.has_issued(*handle))
        .map(|(handle, path)| InvariantViolation {
            invariant: "handle_monotonicity",
            description: format!(
                "Entry {} => {} in the {} store is outside the issued range 0x{:08x}..0x{:08x}",
                handle,
                path,
                kind,
                generator.base(),
                generator.peek()
            ),
        })
        .collect()
}

/// Invariant 4: No entry handle lies in the reserved hive range
fn check_hive_range(kind: StoreKind, snapshot: &TableSnapshot) -> Vec<InvariantViolation> {
    snapshot
        .entries
        .iter()
        .filter(|(handle, _)| Hive::is_hive_handle(*handle))
        .map(|(handle, path)| InvariantViolation {
            invariant: "hive_range",
            description: format!(
                "Entry {} => {} in the {} store uses a reserved hive handle",
                handle, path, kind
            ),
        })
        .collect()
}

/// Invariant 5: Aliases are adopted, entries are not
fn check_alias_reservation(
    kind: StoreKind,
    snapshot: &TableSnapshot,
    handles: &HandleIndex,
) -> Vec<InvariantViolation> {
    let unreserved = snapshot
        .aliases
        .iter()
        .filter(|(alias, _)| !handles.is_adopted(*alias))
        .map(|(alias, _)| InvariantViolation {
            invariant: "alias_reservation",
            description: format!("Alias {} in the {} store is not adopted", alias, kind),
        });
    let adopted_entries = snapshot
        .entries
        .iter()
        .filter(|(handle, _)| handles.is_adopted(*handle))
        .map(|(handle, path)| InvariantViolation {
            invariant: "alias_reservation",
            description: format!(
                "Entry {} => {} in the {} store is also adopted as an alias",
                handle, path, kind
            ),
        });
    unreserved.chain(adopted_entries).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RegistryStore, TransparentRegistry, VirtualRegistry};
    use hivefold_core::{KeyPath, RuleCollection};
    use hivefold_host_mock::MockHostRegistry;
    use std::sync::Arc;

    fn path(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    struct Fixture {
        handles: Arc<HandleIndex>,
        virtual_store: Arc<VirtualRegistry>,
        transparent_store: Arc<TransparentRegistry>,
        switch: RegistrySwitch,
    }

    fn fixture() -> Fixture {
        let handles = Arc::new(HandleIndex::default());
        let host = Arc::new(MockHostRegistry::new());
        host.insert_key("HKLM\\Software\\Vendor");
        let virtual_store = Arc::new(VirtualRegistry::new(handles.clone()));
        let transparent_store = Arc::new(TransparentRegistry::new(handles.clone(), host.clone()));
        let switch = RegistrySwitch::new(
            virtual_store.clone(),
            transparent_store.clone(),
            RuleCollection::new(),
            host,
        );
        Fixture {
            handles,
            virtual_store,
            transparent_store,
            switch,
        }
    }

    #[test]
    fn test_fresh_engine_holds() {
        let f = fixture();
        assert!(check_all_invariants(&f.switch, &f.handles).is_empty());
    }

    #[test]
    fn test_normal_bindings_hold() {
        let f = fixture();
        let (handle, _) = f.virtual_store.create_key(&path("HKCU\\Software\\App")).unwrap();
        f.virtual_store.add_alias(handle, Handle(0x0f00_0001)).unwrap();
        f.transparent_store.open_key(&path("HKLM\\Software\\Vendor")).unwrap();
        assert!(check_all_invariants(&f.switch, &f.handles).is_empty());
    }

    #[test]
    fn test_detects_shared_handle() {
        let f = fixture();
        let (handle, _) = f.virtual_store.create_key(&path("HKCU\\Software\\App")).unwrap();
        let other = f.transparent_store.open_key(&path("HKLM\\Software\\Vendor")).unwrap();
        f.transparent_store.add_alias(other, handle).unwrap();

        let violations = check_all_invariants(&f.switch, &f.handles);
        assert!(violations.iter().any(|v| v.invariant == "store_exclusivity"));
        // The virtual entry's value is now also adopted.
        assert!(violations.iter().any(|v| v.invariant == "alias_reservation"));
    }

    #[test]
    fn test_detects_foreign_entry() {
        let f = fixture();
        f.virtual_store.create_key(&path("HKCU\\Software\\Stray")).unwrap();

        // Checked against an index the stores never drew from.
        let foreign = HandleIndex::new(0x0100_0000);
        let violations = check_all_invariants(&f.switch, &foreign);
        assert!(violations
            .iter()
            .any(|v| v.invariant == "handle_monotonicity"));
    }

    #[test]
    fn test_closed_alias_releases_reservation() {
        let f = fixture();
        let (handle, _) = f.virtual_store.create_key(&path("HKCU\\Software\\App")).unwrap();
        f.virtual_store.add_alias(handle, Handle(0x0f00_0001)).unwrap();
        assert!(f.handles.is_adopted(Handle(0x0f00_0001)));

        f.virtual_store.close_key(handle).unwrap();
        assert!(!f.handles.is_adopted(Handle(0x0f00_0001)));
        assert!(check_all_invariants(&f.switch, &f.handles).is_empty());
    }
}
