//! Well-known registry roots.
//!
//! Each hive owns a handle value the OS reserves for it and a canonical
//! path prefix. The handle range `HIVE_HANDLE_FIRST..=HIVE_HANDLE_LAST` is
//! never issued by [`crate::HandleGenerator`].

use serde::{Deserialize, Serialize};

use crate::path::KeyPath;
use crate::types::Handle;

/// First reserved hive handle (`HKEY_CLASSES_ROOT`)
pub const HIVE_HANDLE_FIRST: u32 = 0x8000_0000;

/// Last reserved hive handle (`HKEY_DYN_DATA`)
pub const HIVE_HANDLE_LAST: u32 = 0x8000_0006;

/// Registry root category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hive {
    /// File associations and COM registrations
    ClassesRoot,
    /// Configuration of the interactive user
    CurrentUser,
    /// Machine-wide configuration
    LocalMachine,
    /// Every loaded user profile
    Users,
    /// Performance counters, generated on read
    PerformanceData,
    /// Active hardware profile
    CurrentConfig,
    /// Dynamic device data
    DynData,
}

impl Hive {
    /// Every hive, in reserved-handle order.
    pub const ALL: [Hive; 7] = [
        Hive::ClassesRoot,
        Hive::CurrentUser,
        Hive::LocalMachine,
        Hive::Users,
        Hive::PerformanceData,
        Hive::CurrentConfig,
        Hive::DynData,
    ];

    /// The handle value the OS reserves for this hive.
    pub fn handle(self) -> Handle {
        let offset = match self {
            Hive::ClassesRoot => 0,
            Hive::CurrentUser => 1,
            Hive::LocalMachine => 2,
            Hive::Users => 3,
            Hive::PerformanceData => 4,
            Hive::CurrentConfig => 5,
            Hive::DynData => 6,
        };
        Handle(HIVE_HANDLE_FIRST + offset)
    }

    /// Map a reserved handle back to its hive.
    pub fn from_handle(handle: Handle) -> Option<Hive> {
        if !Self::is_hive_handle(handle) {
            return None;
        }
        Self::ALL.get((handle.0 - HIVE_HANDLE_FIRST) as usize).copied()
    }

    /// Check if `handle` is one of the reserved hive handles.
    pub fn is_hive_handle(handle: Handle) -> bool {
        (HIVE_HANDLE_FIRST..=HIVE_HANDLE_LAST).contains(&handle.0)
    }

    /// Canonical root name, as used in fully qualified paths.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
            Hive::PerformanceData => "HKEY_PERFORMANCE_DATA",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
            Hive::DynData => "HKEY_DYN_DATA",
        }
    }

    /// Conventional abbreviation.
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::PerformanceData => "HKPD",
            Hive::CurrentConfig => "HKCC",
            Hive::DynData => "HKDD",
        }
    }

    /// Canonical path of the hive root.
    pub fn canonical_path(self) -> KeyPath {
        // Canonical names are non-empty and separator-free.
        match KeyPath::parse(self.canonical_name()) {
            Some(path) => path,
            None => unreachable!("hive names always parse"),
        }
    }

    /// Resolve a root component, canonical or abbreviated, ignoring case.
    pub fn from_name(name: &str) -> Option<Hive> {
        Self::ALL.iter().copied().find(|hive| {
            hive.canonical_name().eq_ignore_ascii_case(name)
                || hive.short_name().eq_ignore_ascii_case(name)
        })
    }

    /// The hive a path lives in.
    pub fn of_path(path: &KeyPath) -> Option<Hive> {
        path.hive()
    }
}
