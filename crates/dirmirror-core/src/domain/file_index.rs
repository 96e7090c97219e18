//! File index: the name to size mapping at the heart of the mirror
//!
//! The same type serves as the durable manifest (what is believed to exist
//! remotely) and as a fresh local snapshot (what exists on disk now).
//! Entries are kept in a `BTreeMap` so iteration, diffs and the persisted
//! JSON are all ordered by name.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping of file name to size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIndex(BTreeMap<String, u64>);

/// The persisted record of files confirmed on the remote side.
pub type Manifest = FileIndex;

/// A freshly scanned view of the watched directory.
pub type LocalSnapshot = FileIndex;

impl FileIndex {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Inserts or replaces the size recorded for `name`.
    pub fn insert(&mut self, name: impl Into<String>, size: u64) -> Option<u64> {
        self.0.insert(name.into(), size)
    }

    pub fn remove(&mut self, name: &str) -> Option<u64> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, u64> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Sum of all recorded sizes.
    pub fn total_bytes(&self) -> u64 {
        self.0.values().sum()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for FileIndex {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'a> IntoIterator for &'a FileIndex {
    type Item = (&'a String, &'a u64);
    type IntoIter = btree_map::Iter<'a, String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Diff
// ============================================================================

/// Partition of `keys(manifest) ∪ keys(local)` into the work a cycle must do.
///
/// Names present in both with equal sizes are unchanged and appear in none
/// of the lists. Each list is sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// In the manifest but no longer on disk
    pub removed: Vec<String>,
    /// In both, with a different size
    pub modified: Vec<String>,
    /// On disk but not yet in the manifest
    pub added: Vec<String>,
}

impl Diff {
    /// Computes the diff between the previous manifest and a local snapshot.
    pub fn compute(manifest: &Manifest, local: &LocalSnapshot) -> Self {
        let mut diff = Diff::default();

        for (name, size) in manifest {
            match local.get(name) {
                None => diff.removed.push(name.clone()),
                Some(current) if current != *size => diff.modified.push(name.clone()),
                Some(_) => {}
            }
        }

        diff.added = local
            .names()
            .filter(|name| !manifest.contains(name))
            .map(str::to_string)
            .collect();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty() && self.added.is_empty()
    }

    /// Number of remote operations this diff implies.
    pub fn len(&self) -> usize {
        self.removed.len() + self.modified.len() + self.added.len()
    }
}
