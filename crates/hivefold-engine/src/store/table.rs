//! Per-store handle table.
//!
//! Entries own a key path; aliases point at an entry without owning it.
//! One mutex guards both maps so membership checks and mutations see a
//! consistent table. Alias values are adopted in the shared
//! [`HandleIndex`] while bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use hivefold_core::{Handle, KeyPath, StoreError};
use parking_lot::Mutex;
use tracing::debug;

use super::HandleIndex;

/// Copy of a table's bindings, for inspection and invariant checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Owned bindings (handle -> path)
    pub entries: Vec<(Handle, KeyPath)>,
    /// Alias bindings (alias -> entry handle)
    pub aliases: Vec<(Handle, Handle)>,
}

impl TableSnapshot {
    /// Every handle in the snapshot, entries first.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.entries
            .iter()
            .map(|(handle, _)| *handle)
            .chain(self.aliases.iter().map(|(alias, _)| *alias))
    }
}

#[derive(Default)]
struct TableInner {
    entries: BTreeMap<Handle, KeyPath>,
    aliases: BTreeMap<Handle, Handle>,
}

impl TableInner {
    /// Follow an alias to its entry; entries resolve to themselves.
    fn entry_handle(&self, handle: Handle) -> Option<Handle> {
        if self.entries.contains_key(&handle) {
            Some(handle)
        } else {
            self.aliases.get(&handle).copied()
        }
    }

    /// Remove `entry` and its aliases. Returns the path and the released
    /// alias values.
    fn remove_entry(&mut self, entry: Handle) -> Option<(KeyPath, Vec<Handle>)> {
        let path = self.entries.remove(&entry)?;
        let mut released = Vec::new();
        self.aliases.retain(|alias, target| {
            if *target == entry {
                released.push(*alias);
                false
            } else {
                true
            }
        });
        Some((path, released))
    }
}

/// Handle table owned by one store.
pub struct KeyTable {
    index: Arc<HandleIndex>,
    inner: Mutex<TableInner>,
}

impl KeyTable {
    /// Create an empty table drawing handles from `index`.
    pub fn new(index: Arc<HandleIndex>) -> Self {
        Self {
            index,
            inner: Mutex::new(TableInner::default()),
        }
    }

    /// The shared handle index
    pub fn index(&self) -> &Arc<HandleIndex> {
        &self.index
    }

    /// Bind a freshly issued handle to `path`.
    pub fn bind(&self, path: KeyPath) -> Handle {
        let handle = self.index.issue();
        debug!(handle = %handle, path = %path, "binding key handle");
        self.inner.lock().entries.insert(handle, path);
        handle
    }

    /// Check if `handle` is bound as an entry or alias.
    pub fn contains(&self, handle: Handle) -> bool {
        self.inner.lock().entry_handle(handle).is_some()
    }

    /// Path bound to `handle`, following aliases.
    pub fn path_of(&self, handle: Handle) -> Option<KeyPath> {
        let inner = self.inner.lock();
        let entry = inner.entry_handle(handle)?;
        inner.entries.get(&entry).cloned()
    }

    /// Register `alias` as resolving to the entry behind `handle`.
    ///
    /// # Returns
    /// * `Ok(())` - Alias registered
    /// * `Err(StoreError::InvalidHandle)` - `handle` is not bound here
    /// * `Err(StoreError::AccessDenied)` - `alias` is already bound here or
    ///   adopted elsewhere
    pub fn add_alias(&self, handle: Handle, alias: Handle) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entry_handle(handle)
            .ok_or(StoreError::InvalidHandle)?;
        if inner.entry_handle(alias).is_some() || !self.index.adopt(alias) {
            return Err(StoreError::AccessDenied);
        }
        debug!(alias = %alias, entry = %entry, "registering key handle alias");
        inner.aliases.insert(alias, entry);
        Ok(())
    }

    /// Release `handle`.
    ///
    /// An alias is released on its own. An entry takes its aliases with it.
    /// Returns the path the handle was bound to.
    pub fn close(&self, handle: Handle) -> Option<KeyPath> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.aliases.remove(&handle) {
            debug!(alias = %handle, "releasing key handle alias");
            self.index.release(handle);
            return inner.entries.get(&entry).cloned();
        }
        let (path, released) = inner.remove_entry(handle)?;
        debug!(handle = %handle, path = %path, "releasing key handle");
        self.release_all(&released);
        Some(path)
    }

    /// Release the entry behind `handle` (following an alias) and all of
    /// its aliases. Returns the entry's path.
    pub fn remove_entry(&self, handle: Handle) -> Option<KeyPath> {
        let mut inner = self.inner.lock();
        let entry = inner.entry_handle(handle)?;
        let (path, released) = inner.remove_entry(entry)?;
        debug!(handle = %entry, path = %path, "removing key entry");
        self.release_all(&released);
        Some(path)
    }

    fn release_all(&self, aliases: &[Handle]) {
        for alias in aliases {
            self.index.release(*alias);
        }
    }

    /// Number of entries (aliases excluded)
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Copy the current bindings.
    pub fn snapshot(&self) -> TableSnapshot {
        let inner = self.inner.lock();
        TableSnapshot {
            entries: inner
                .entries
                .iter()
                .map(|(handle, path)| (*handle, path.clone()))
                .collect(),
            aliases: inner
                .aliases
                .iter()
                .map(|(alias, entry)| (*alias, *entry))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    fn table() -> KeyTable {
        KeyTable::new(Arc::new(HandleIndex::default()))
    }

    #[test]
    fn test_bind_issues_distinct_handles() {
        let table = table();
        let a = table.bind(path("HKLM\\Software"));
        let b = table.bind(path("HKLM\\Software"));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.path_of(a), table.path_of(b));
    }

    #[test]
    fn test_alias_resolves_to_entry_path() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software\\App"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();

        assert!(table.contains(Handle(0x0f00_0000)));
        assert_eq!(table.path_of(Handle(0x0f00_0000)), Some(path("HKCU\\Software\\App")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_alias_of_alias_targets_entry() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software\\App"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();
        table.add_alias(Handle(0x0f00_0000), Handle(0x0f00_0001)).unwrap();

        let snapshot = table.snapshot();
        assert!(snapshot.aliases.iter().all(|(_, target)| *target == entry));
    }

    #[test]
    fn test_add_alias_errors() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software"));
        assert_eq!(
            table.add_alias(Handle(0x999), Handle(0x0f00_0000)),
            Err(StoreError::InvalidHandle)
        );
        assert_eq!(table.add_alias(entry, entry), Err(StoreError::AccessDenied));
    }

    #[test]
    fn test_close_alias_keeps_entry() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();

        assert_eq!(table.close(Handle(0x0f00_0000)), Some(path("HKCU\\Software")));
        assert!(table.contains(entry));
        assert!(!table.contains(Handle(0x0f00_0000)));
    }

    #[test]
    fn test_close_entry_drops_aliases() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();

        assert!(table.close(entry).is_some());
        assert!(!table.contains(Handle(0x0f00_0000)));
        assert!(table.is_empty());
        assert_eq!(table.close(entry), None);
    }

    #[test]
    fn test_remove_entry_through_alias() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();

        assert_eq!(table.remove_entry(Handle(0x0f00_0000)), Some(path("HKCU\\Software")));
        assert!(!table.contains(entry));
        assert_eq!(table.snapshot(), TableSnapshot::default());
    }

    #[test]
    fn test_alias_values_are_adopted_while_bound() {
        let table = table();
        let entry = table.bind(path("HKCU\\Software"));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();
        table.add_alias(entry, Handle(0x0f00_0001)).unwrap();
        assert!(table.index().is_adopted(Handle(0x0f00_0000)));

        table.close(Handle(0x0f00_0000));
        assert!(!table.index().is_adopted(Handle(0x0f00_0000)));
        assert!(table.index().is_adopted(Handle(0x0f00_0001)));

        table.close(entry);
        assert_eq!(table.index().adopted_count(), 0);
    }

    #[test]
    fn test_alias_adopted_by_another_table_is_refused() {
        let index = Arc::new(HandleIndex::default());
        let first = KeyTable::new(index.clone());
        let second = KeyTable::new(index);
        let a = first.bind(path("HKCU\\Software"));
        let b = second.bind(path("HKLM\\Software"));

        first.add_alias(a, Handle(0x0f00_0000)).unwrap();
        assert_eq!(
            second.add_alias(b, Handle(0x0f00_0000)),
            Err(StoreError::AccessDenied)
        );
        assert!(!second.contains(Handle(0x0f00_0000)));
    }

    #[test]
    fn test_bind_steps_over_adopted_value() {
        let table = KeyTable::new(Arc::new(HandleIndex::new(0x0eff_ffff)));
        let entry = table.bind(path("HKPD\\Global"));
        assert_eq!(entry, Handle(0x0eff_ffff));
        table.add_alias(entry, Handle(0x0f00_0000)).unwrap();

        assert_eq!(table.bind(path("HKPD\\Global")), Handle(0x0f00_0001));
    }
}
