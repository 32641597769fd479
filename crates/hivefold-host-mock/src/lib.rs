//! Mock host registry for testing hivefold
//!
//! This provides an in-memory implementation of the [`HostRegistry`] trait
//! so the engine can be exercised without a real OS registry. Every hive
//! root exists from the start; everything else is created by the test or
//! by the engine under test.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};

use hivefold_core::{CreationDisposition, Hive, KeyPath, RegistryValue};
use hivefold_host::{HostError, HostRegistry, RawHandle};
use parking_lot::Mutex;

/// First raw handle value the mock hands out.
///
/// Kept far from the engine's default handle base so raw and engine
/// handles never collide in tests.
pub const RAW_HANDLE_BASE: u32 = 0x0f00_0000;

/// Simulated key state
#[derive(Default)]
struct MockKey {
    values: Vec<RegistryValue>,
}

/// Mock host registry for unit testing
///
/// Provides simulated keys, values and raw handles, plus a call log and
/// per-path access denial for driving failure paths.
pub struct MockHostRegistry {
    /// Simulated keys, ordered case-insensitively
    keys: Mutex<BTreeMap<KeyPath, MockKey>>,
    /// Raw handles currently open (handle -> key path)
    open_handles: Mutex<BTreeMap<RawHandle, KeyPath>>,
    /// Paths (and their subtrees) the host refuses to touch
    denied: Mutex<BTreeSet<KeyPath>>,
    /// Captured call log
    call_log: Mutex<Vec<String>>,
    /// Next raw handle to assign
    next_raw: AtomicU32,
}

impl MockHostRegistry {
    /// Create a mock registry holding only the hive roots
    pub fn new() -> Self {
        let keys = Hive::ALL
            .iter()
            .map(|hive| (hive.canonical_path(), MockKey::default()))
            .collect();
        Self {
            keys: Mutex::new(keys),
            open_handles: Mutex::new(BTreeMap::new()),
            denied: Mutex::new(BTreeSet::new()),
            call_log: Mutex::new(Vec::new()),
            next_raw: AtomicU32::new(RAW_HANDLE_BASE),
        }
    }

    // ========== Test setup ==========

    /// Create `path` and any missing parents
    pub fn insert_key(&self, path: &str) -> KeyPath {
        let path = parse(path);
        insert_with_parents(&mut self.keys.lock(), &path);
        path
    }

    /// Store a value under `path`, creating the key if needed
    pub fn insert_value(&self, path: &str, value: RegistryValue) {
        let path = self.insert_key(path);
        let mut keys = self.keys.lock();
        if let Some(key) = keys.get_mut(&path) {
            upsert_value(key, value);
        }
    }

    /// Remove a key and its subtree behind the engine's back
    pub fn remove_key_externally(&self, path: &str) {
        let path = parse(path);
        self.keys.lock().retain(|existing, _| !existing.is_under(&path));
    }

    /// Open a raw handle the engine never saw, as a guest would through an
    /// unintercepted code path
    pub fn open_raw(&self, path: &str) -> RawHandle {
        let path = parse(path);
        insert_with_parents(&mut self.keys.lock(), &path);
        self.issue_raw(path)
    }

    /// Refuse every operation on `path` and beneath it
    pub fn deny(&self, path: &str) {
        self.denied.lock().insert(parse(path));
    }

    // ========== Inspection ==========

    /// Check if a key exists, without logging the call
    pub fn contains_key(&self, path: &str) -> bool {
        self.keys.lock().contains_key(&parse(path))
    }

    /// Read a value, without logging the call
    pub fn value(&self, path: &str, name: &str) -> Option<RegistryValue> {
        let keys = self.keys.lock();
        let key = keys.get(&parse(path))?;
        key.values.iter().find(|v| v.is_named(name)).cloned()
    }

    /// Check if a raw handle is still open
    pub fn is_handle_open(&self, handle: RawHandle) -> bool {
        self.open_handles.lock().contains_key(&handle)
    }

    /// Number of raw handles currently open
    pub fn open_handle_count(&self) -> usize {
        self.open_handles.lock().len()
    }

    /// Get all captured calls
    pub fn get_call_log(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }

    /// Check if a call containing `substr` was made
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.call_log.lock().iter().any(|msg| msg.contains(substr))
    }

    /// Clear the call log
    pub fn clear_call_log(&self) {
        self.call_log.lock().clear();
    }

    // ========== Internals ==========

    fn log(&self, msg: String) {
        self.call_log.lock().push(msg);
    }

    fn is_denied(&self, path: &KeyPath) -> bool {
        self.denied.lock().iter().any(|denied| path.is_under(denied))
    }

    fn issue_raw(&self, path: KeyPath) -> RawHandle {
        let handle = RawHandle(self.next_raw.fetch_add(1, Ordering::SeqCst));
        self.open_handles.lock().insert(handle, path);
        handle
    }
}

impl Default for MockHostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry for MockHostRegistry {
    fn key_exists(&self, path: &KeyPath) -> bool {
        self.log(format!("[mock-host] key_exists {}", path));
        self.keys.lock().contains_key(path)
    }

    fn create_key(&self, path: &KeyPath) -> Result<(RawHandle, CreationDisposition), HostError> {
        self.log(format!("[mock-host] create_key {}", path));
        if self.is_denied(path) {
            return Err(HostError::AccessDenied);
        }
        let created = insert_with_parents(&mut self.keys.lock(), path);
        let disposition = if created {
            CreationDisposition::CreatedNewKey
        } else {
            CreationDisposition::OpenedExistingKey
        };
        Ok((self.issue_raw(path.clone()), disposition))
    }

    fn open_key(&self, path: &KeyPath, writable: bool) -> Option<RawHandle> {
        self.log(format!("[mock-host] open_key {} writable={}", path, writable));
        if writable && self.is_denied(path) {
            return None;
        }
        if !self.keys.lock().contains_key(path) {
            return None;
        }
        Some(self.issue_raw(path.clone()))
    }

    fn delete_subtree(&self, parent: &KeyPath, leaf: &str) -> Result<(), HostError> {
        let target = parent.join(leaf);
        self.log(format!("[mock-host] delete_subtree {}", target));
        if self.is_denied(&target) {
            return Err(HostError::AccessDenied);
        }
        let mut keys = self.keys.lock();
        if !keys.contains_key(parent) || !keys.contains_key(&target) {
            return Err(HostError::NotFound);
        }
        keys.retain(|existing, _| !existing.is_under(&target));
        Ok(())
    }

    fn query_value(&self, path: &KeyPath, name: &str) -> Result<RegistryValue, HostError> {
        self.log(format!("[mock-host] query_value {} {:?}", path, name));
        if self.is_denied(path) {
            return Err(HostError::AccessDenied);
        }
        let keys = self.keys.lock();
        let key = keys.get(path).ok_or(HostError::NotFound)?;
        key.values
            .iter()
            .find(|v| v.is_named(name))
            .cloned()
            .ok_or(HostError::NotFound)
    }

    fn set_value(&self, path: &KeyPath, value: &RegistryValue) -> Result<(), HostError> {
        self.log(format!("[mock-host] set_value {} {:?}", path, value.name));
        if self.is_denied(path) {
            return Err(HostError::AccessDenied);
        }
        let mut keys = self.keys.lock();
        let key = keys.get_mut(path).ok_or(HostError::NotFound)?;
        upsert_value(key, value.clone());
        Ok(())
    }

    fn delete_value(&self, path: &KeyPath, name: &str) -> Result<(), HostError> {
        self.log(format!("[mock-host] delete_value {} {:?}", path, name));
        if self.is_denied(path) {
            return Err(HostError::AccessDenied);
        }
        let mut keys = self.keys.lock();
        let key = keys.get_mut(path).ok_or(HostError::NotFound)?;
        let before = key.values.len();
        key.values.retain(|v| !v.is_named(name));
        if key.values.len() == before {
            return Err(HostError::NotFound);
        }
        Ok(())
    }

    fn key_path_by_handle(&self, handle: RawHandle) -> Option<KeyPath> {
        self.log(format!("[mock-host] key_path_by_handle {}", handle));
        self.open_handles.lock().get(&handle).cloned()
    }

    fn close_handle(&self, handle: RawHandle) {
        self.log(format!("[mock-host] close_handle {}", handle));
        self.open_handles.lock().remove(&handle);
    }
}

fn parse(path: &str) -> KeyPath {
    match KeyPath::parse(path) {
        Some(path) => path,
        None => panic!("mock host given an unusable key path: {:?}", path),
    }
}

/// Insert `path` and its missing ancestors. Returns whether `path` itself was new.
fn insert_with_parents(keys: &mut BTreeMap<KeyPath, MockKey>, path: &KeyPath) -> bool {
    if keys.contains_key(path) {
        return false;
    }
    let mut current: Option<KeyPath> = None;
    for component in path.components() {
        let next = match &current {
            Some(parent) => parent.join(component),
            None => parse(component),
        };
        keys.entry(next.clone()).or_default();
        current = Some(next);
    }
    true
}

fn upsert_value(key: &mut MockKey, value: RegistryValue) {
    match key.values.iter_mut().find(|v| v.is_named(&value.name)) {
        Some(existing) => *existing = value,
        None => key.values.push(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivefold_core::ValueType;

    fn key(path: &str) -> KeyPath {
        KeyPath::parse(path).unwrap()
    }

    #[test]
    fn test_hive_roots_exist() {
        let host = MockHostRegistry::new();
        for hive in Hive::ALL {
            assert!(host.key_exists(&hive.canonical_path()));
        }
        assert!(!host.key_exists(&key("HKLM\\Software")));
    }

    #[test]
    fn test_create_reports_disposition() {
        let host = MockHostRegistry::new();
        let (_, first) = host.create_key(&key("HKLM\\Software\\Vendor")).unwrap();
        let (_, second) = host.create_key(&key("hklm\\software\\vendor")).unwrap();
        assert_eq!(first, CreationDisposition::CreatedNewKey);
        assert_eq!(second, CreationDisposition::OpenedExistingKey);
        assert!(host.contains_key("HKLM\\Software"));
    }

    #[test]
    fn test_delete_subtree() {
        let host = MockHostRegistry::new();
        host.insert_key("HKLM\\Software\\Vendor\\App\\Sub");
        host.delete_subtree(&key("HKLM\\Software\\Vendor"), "App").unwrap();
        assert!(!host.contains_key("HKLM\\Software\\Vendor\\App"));
        assert!(!host.contains_key("HKLM\\Software\\Vendor\\App\\Sub"));
        assert!(host.contains_key("HKLM\\Software\\Vendor"));
        assert_eq!(
            host.delete_subtree(&key("HKLM\\Software\\Vendor"), "App"),
            Err(HostError::NotFound)
        );
    }

    #[test]
    fn test_values() {
        let host = MockHostRegistry::new();
        host.insert_value("HKCU\\Software\\App", RegistryValue::dword("Count", 3));
        let value = host.query_value(&key("HKCU\\Software\\App"), "count").unwrap();
        assert_eq!(value.value_type, ValueType::DWord);

        host.delete_value(&key("HKCU\\Software\\App"), "COUNT").unwrap();
        assert_eq!(
            host.query_value(&key("HKCU\\Software\\App"), "Count"),
            Err(HostError::NotFound)
        );
        assert_eq!(
            host.delete_value(&key("HKCU\\Software\\App"), "Count"),
            Err(HostError::NotFound)
        );
    }

    #[test]
    fn test_denied_paths() {
        let host = MockHostRegistry::new();
        host.insert_key("HKLM\\System\\Locked");
        host.deny("HKLM\\System");
        assert_eq!(
            host.create_key(&key("HKLM\\System\\Locked\\New")).map(|_| ()),
            Err(HostError::AccessDenied)
        );
        assert!(host.open_key(&key("HKLM\\System\\Locked"), true).is_none());
        assert!(host.open_key(&key("HKLM\\System\\Locked"), false).is_some());
    }

    #[test]
    fn test_raw_handles() {
        let host = MockHostRegistry::new();
        let raw = host.open_raw("HKCU\\Software\\Leaked");
        assert!(raw.0 >= RAW_HANDLE_BASE);
        assert_eq!(host.key_path_by_handle(raw), Some(key("HKCU\\Software\\Leaked")));
        host.close_handle(raw);
        assert!(!host.is_handle_open(raw));
        assert_eq!(host.key_path_by_handle(raw), None);
        assert!(host.has_log_containing("close_handle"));
    }
}
