//! Reference names attached to commits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of a reference name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RefType {
    LocalBranch,
    RemoteBranch,
    LocalTag,
    RemoteTag,
}

/// The reference names one commit carries, grouped by kind.
///
/// An entry with no names left must be pruned by the owner; `is_empty`
/// reports when that is due.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    refs: BTreeMap<RefType, Vec<String>>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: RefType, name: impl Into<String>) {
        let name = name.into();
        let names = self.refs.entry(kind).or_default();

        if !names.contains(&name) {
            names.push(name);
        }
    }

    /// Remove one name; drops the kind's entry when it empties.
    pub fn remove(&mut self, kind: RefType, name: &str) {
        if let Some(names) = self.refs.get_mut(&kind) {
            names.retain(|n| n != name);
            if names.is_empty() {
                self.refs.remove(&kind);
            }
        }
    }

    pub fn get(&self, kind: RefType) -> Vec<String> {
        self.refs.get(&kind).cloned().unwrap_or_default()
    }

    pub fn contains(&self, kind: RefType, name: &str) -> bool {
        self.refs
            .get(&kind)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
