//! Virtualization rules.
//!
//! A rule binds a key path prefix to a [`VirtualizationType`]. The collection
//! is built once and read without locking afterwards.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::path::KeyPath;
use crate::types::VirtualizationType;

/// A single path-prefix rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Key path the rule covers, including everything beneath it
    pub path: KeyPath,
    /// Policy applied to covered keys
    pub virtualization: VirtualizationType,
}

impl Rule {
    /// Create a rule.
    pub fn new(path: KeyPath, virtualization: VirtualizationType) -> Self {
        Self {
            path,
            virtualization,
        }
    }

    /// Check if this rule covers `path`.
    pub fn covers(&self, path: &KeyPath) -> bool {
        path.is_under(&self.path)
    }
}

/// Ordered set of rules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleCollection {
    rules: Vec<Rule>,
}

impl RuleCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Later rules never shadow an earlier rule of equal depth.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Find the policy for `path`.
    ///
    /// The deepest covering rule wins; among rules of equal depth the first
    /// one added wins.
    pub fn has_rule(&self, path: &KeyPath) -> Option<VirtualizationType> {
        let mut best: Option<&Rule> = None;
        for rule in self.rules.iter().filter(|rule| rule.covers(path)) {
            match best {
                Some(current) if current.path.depth() >= rule.path.depth() => {}
                _ => best = Some(rule),
            }
        }
        best.map(|rule| rule.virtualization)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate the rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

impl FromIterator<Rule> for RuleCollection {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
