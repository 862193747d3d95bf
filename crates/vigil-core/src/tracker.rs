#![forbid(unsafe_code)]

//! The dependency/path tracker.
//!
//! Per identity, the tracker remembers which property names have already
//! been observed (the dependency set) and the canonical path under which the
//! node was first reached (the path table). The dependency membership test
//! is what classifies a write as *new* versus *changed*.
//!
//! # Invariants
//!
//! 1. A path is assigned once, at first reach; later assignments for the
//!    same identity are ignored (aliasing keeps the original route).
//! 2. A dependency entry exists only while its identity has at least one
//!    observed property; removing the last one removes the entry.
//! 3. All operations are O(1) amortized.

use crate::graph::NodeId;
use crate::{Map, Set};

#[derive(Debug, Default)]
pub struct ChangeTracker {
    dependencies: Map<NodeId, Set<String>>,
    paths: Map<NodeId, String>,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `prop` on `id` has been observed under `path`.
    pub fn record_change(&mut self, id: NodeId, prop: &str, path: &str) {
        self.dependencies
            .entry(id)
            .or_default()
            .insert(prop.to_string());
        self.paths
            .entry(id)
            .or_insert_with(|| path.to_string());
    }

    /// Assign the canonical path for an identity at wrap time. Returns
    /// whether the path was newly assigned.
    pub fn assign_path(&mut self, id: NodeId, path: &str) -> bool {
        if self.paths.contains_key(&id) {
            return false;
        }
        self.paths.insert(id, path.to_string());
        true
    }

    #[must_use]
    pub fn has_dependency(&self, id: NodeId, prop: &str) -> bool {
        self.dependencies
            .get(&id)
            .is_some_and(|props| props.contains(prop))
    }

    /// The canonical path of an identity; empty string when unknown.
    #[must_use]
    pub fn get_path(&self, id: NodeId) -> &str {
        self.paths.get(&id).map_or("", String::as_str)
    }

    /// Forget one observed property; drops the identity's entry when it was
    /// the last one.
    pub fn remove_dependency(&mut self, id: NodeId, prop: &str) {
        if let Some(props) = self.dependencies.get_mut(&id) {
            props.remove(prop);
            if props.is_empty() {
                self.dependencies.remove(&id);
            }
        }
    }

    /// Drop everything known about an identity (registry teardown).
    pub fn forget(&mut self, id: NodeId) {
        self.dependencies.remove(&id);
        self.paths.remove(&id);
    }

    /// Number of identities with at least one observed property.
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.dependencies.len()
    }
}
