//! Registry key paths.
//!
//! A [`KeyPath`] is a backslash-delimited chain starting at a hive. Two paths
//! that differ only in case name the same key, so equality, ordering and
//! hashing all go through a case-folded copy while the original casing is
//! kept for display.

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

use crate::hive::Hive;

/// Path separator used by the host registry
pub const SEPARATOR: char = '\\';

/// Error for strings that cannot name a key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid key path: {0:?}")]
pub struct InvalidKeyPath(pub String);

/// Fully qualified, case-insensitive registry key path.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    /// Normalized path with the caller's casing
    display: String,
    /// Case-folded copy used for comparisons
    folded: String,
}

impl KeyPath {
    /// Normalize `raw` into a key path.
    ///
    /// Empty components are dropped and a short hive prefix (`HKLM`, `HKCU`,
    /// ...) is expanded to its canonical name. Returns `None` when nothing
    /// is left or a component contains a NUL.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.contains('\0') {
            return None;
        }

        let mut components: Vec<&str> = raw.split(SEPARATOR).filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            return None;
        }

        if let Some(hive) = Hive::from_name(components[0]) {
            components[0] = hive.canonical_name();
        }

        Some(Self::from_normalized(components.join("\\")))
    }

    fn from_normalized(display: String) -> Self {
        let folded = display.to_lowercase();
        Self { display, folded }
    }

    /// The normalized path as written.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The case-folded path, suitable as a map key.
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// The hive this path starts in, if it is a known one.
    pub fn hive(&self) -> Option<Hive> {
        Hive::from_name(self.components().next()?)
    }

    /// Iterate the path components, hive first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.display.split(SEPARATOR)
    }

    /// Number of components, hive included.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Check if this path names the root of its hive.
    pub fn is_hive_root(&self) -> bool {
        self.depth() == 1
    }

    /// Split into the parent path and the last component.
    ///
    /// Returns `None` for a single-component path.
    pub fn split_leaf(&self) -> Option<(KeyPath, &str)> {
        let pos = self.display.rfind(SEPARATOR)?;
        let parent = Self::from_normalized(String::from(&self.display[..pos]));
        Some((parent, &self.display[pos + 1..]))
    }

    /// Append a relative subkey path.
    ///
    /// An empty `sub_key` yields this path unchanged.
    pub fn join(&self, sub_key: &str) -> KeyPath {
        let mut display = self.display.clone();
        for component in sub_key.split(SEPARATOR).filter(|c| !c.is_empty()) {
            display.push(SEPARATOR);
            display.push_str(component);
        }
        Self::from_normalized(display)
    }

    /// Check if this path equals `base` or lies beneath it.
    pub fn is_under(&self, base: &KeyPath) -> bool {
        let path = self.folded.as_bytes();
        let base = base.folded.as_bytes();
        path.starts_with(base) && (path.len() == base.len() || path[base.len()] == b'\\')
    }
}

impl PartialEq for KeyPath {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for KeyPath {}

impl Hash for KeyPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for KeyPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPath({:?})", self.display)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for KeyPath {
    type Error = InvalidKeyPath;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        KeyPath::parse(&raw).ok_or(InvalidKeyPath(raw))
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.display
    }
}
