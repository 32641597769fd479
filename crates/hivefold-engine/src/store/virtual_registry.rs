//! In-memory virtual store.
//!
//! Keys and values live only in this process and never reach the host
//! registry. Every hive root exists from the start. The key set can be
//! seeded from, and exported to, [`VirtualKeyRecord`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use hivefold_core::{
    CreationDisposition, Handle, Hive, KeyPath, RegistryValue, StoreError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{HandleIndex, KeyTable, RegistryStore, StoreKind};

/// Serializable form of one virtual key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualKeyRecord {
    /// Fully qualified key path
    pub path: KeyPath,
    /// Values stored under the key
    #[serde(default)]
    pub values: Vec<RegistryValue>,
}

/// Virtual key state
#[derive(Default)]
struct VirtualKey {
    values: Vec<RegistryValue>,
}

/// Store whose keys live only in memory.
pub struct VirtualRegistry {
    table: KeyTable,
    /// Key storage, ordered case-insensitively
    keys: Mutex<BTreeMap<KeyPath, VirtualKey>>,
}

impl VirtualRegistry {
    /// Create a store holding only the hive roots.
    pub fn new(index: Arc<HandleIndex>) -> Self {
        let keys = Hive::ALL
            .iter()
            .map(|hive| (hive.canonical_path(), VirtualKey::default()))
            .collect();
        Self {
            table: KeyTable::new(index),
            keys: Mutex::new(keys),
        }
    }

    /// Create a store seeded with `records`.
    ///
    /// Missing parents of each record are created empty.
    pub fn with_keys(
        index: Arc<HandleIndex>,
        records: impl IntoIterator<Item = VirtualKeyRecord>,
    ) -> Self {
        let store = Self::new(index);
        {
            let mut keys = store.keys.lock();
            for record in records {
                insert_with_parents(&mut keys, &record.path);
                if let Some(key) = keys.get_mut(&record.path) {
                    for value in record.values {
                        upsert_value(key, value);
                    }
                }
            }
        }
        store
    }

    /// Export every key, hive roots included, in path order.
    pub fn export(&self) -> Vec<VirtualKeyRecord> {
        self.keys
            .lock()
            .iter()
            .map(|(path, key)| VirtualKeyRecord {
                path: path.clone(),
                values: key.values.clone(),
            })
            .collect()
    }

    /// Check if `path` exists in the virtual key set.
    pub fn contains_key(&self, path: &KeyPath) -> bool {
        self.keys.lock().contains_key(path)
    }

    fn bound_path(&self, handle: Handle) -> Result<KeyPath, StoreError> {
        self.table.path_of(handle).ok_or(StoreError::InvalidHandle)
    }
}

impl RegistryStore for VirtualRegistry {
    fn kind(&self) -> StoreKind {
        StoreKind::Virtual
    }

    fn table(&self) -> &KeyTable {
        &self.table
    }

    fn open_key(&self, path: &KeyPath) -> Option<Handle> {
        if !self.contains_key(path) {
            return None;
        }
        Some(self.table.bind(path.clone()))
    }

    fn create_key(&self, path: &KeyPath) -> Result<(Handle, CreationDisposition), StoreError> {
        let created = insert_with_parents(&mut self.keys.lock(), path);
        let disposition = if created {
            debug!(path = %path, "created virtual key");
            CreationDisposition::CreatedNewKey
        } else {
            CreationDisposition::OpenedExistingKey
        };
        Ok((self.table.bind(path.clone()), disposition))
    }

    fn delete_key(&self, handle: Handle) -> Result<(), StoreError> {
        if Hive::is_hive_handle(handle) {
            return Err(StoreError::AccessDenied);
        }
        let path = self.bound_path(handle)?;
        if path.is_hive_root() {
            return Err(StoreError::AccessDenied);
        }

        let removed = {
            let mut keys = self.keys.lock();
            let before = keys.len();
            keys.retain(|existing, _| !existing.is_under(&path));
            before - keys.len()
        };
        self.table.remove_entry(handle);

        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(path = %path, removed, "deleted virtual key subtree");
        Ok(())
    }

    fn query_value(&self, handle: Handle, name: &str) -> Result<RegistryValue, StoreError> {
        let path = self.bound_path(handle)?;
        let keys = self.keys.lock();
        let key = keys.get(&path).ok_or(StoreError::NotFound)?;
        key.values
            .iter()
            .find(|value| value.is_named(name))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn set_value(&self, handle: Handle, value: RegistryValue) -> Result<(), StoreError> {
        let path = self.bound_path(handle)?;
        let mut keys = self.keys.lock();
        let key = keys.get_mut(&path).ok_or(StoreError::NotFound)?;
        upsert_value(key, value);
        Ok(())
    }

    fn delete_value(&self, handle: Handle, name: &str) -> Result<(), StoreError> {
        let path = self.bound_path(handle)?;
        let mut keys = self.keys.lock();
        let key = keys.get_mut(&path).ok_or(StoreError::NotFound)?;
        let before = key.values.len();
        key.values.retain(|value| !value.is_named(name));
        if key.values.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Insert `path` and its missing ancestors. Returns whether `path` itself was new.
fn insert_with_parents(keys: &mut BTreeMap<KeyPath, VirtualKey>, path: &KeyPath) -> bool {
    if keys.contains_key(path) {
        return false;
    }
    let mut ancestor = Some(path.clone());
    while let Some(current) = ancestor {
        if keys.contains_key(&current) {
            break;
        }
        ancestor = current.split_leaf().map(|(parent, _)| parent);
        keys.insert(current, VirtualKey::default());
    }
    true
}

fn upsert_value(key: &mut VirtualKey, value: RegistryValue) {
    match key.values.iter_mut().find(|v| v.is_named(&value.name)) {
        Some(existing) => *existing = value,
        None => key.values.push(value),
    }
}
