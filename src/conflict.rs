//! Cross-node contention tracking (remote node → object → count)
//!
//! The distributed data cache reports a conflict whenever a locally cached
//! object is evicted because another node asked for it. Counts are aged by the
//! same windowed pruner as the affinity graph, and a failed node's entries can
//! be dropped immediately.

use crate::identity::{NodeId, ObjectId};
use dashmap::DashMap;
use fnv::FnvHashMap;
use std::collections::HashMap;

/// Owned snapshot of the conflict table
pub type ConflictMap = HashMap<NodeId, HashMap<ObjectId, u64>>;

#[derive(Debug, Default)]
pub struct ConflictTracker {
    nodes: DashMap<NodeId, FnvHashMap<ObjectId, u64>>,
}

impl ConflictTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the (node, object) count; returns the new count
    ///
    /// The caller is responsible for recording the increment with the pruner.
    pub fn note_conflict(&self, object: ObjectId, node: NodeId) -> u64 {
        let mut objects = self.nodes.entry(node).or_default();
        let count = objects.entry(object).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop every entry for `node`; returns whether anything was removed
    pub fn remove_node(&self, node: NodeId) -> bool {
        self.nodes.remove(&node).is_some()
    }

    /// Subtract `amount` from the (node, object) count
    ///
    /// Nodes removed since the increment was recorded are skipped. Entries
    /// reaching zero are dropped, and so is a node with no objects left.
    pub fn decay(&self, node: NodeId, object: ObjectId, amount: u64) -> u64 {
        let remaining = match self.nodes.get_mut(&node) {
            Some(mut objects) => {
                let current = objects.get(&object).copied();
                match current {
                    Some(count) if count > amount => {
                        objects.insert(object, count - amount);
                        count - amount
                    }
                    Some(_) => {
                        objects.remove(&object);
                        0
                    }
                    None => 0,
                }
            }
            None => return 0,
        };
        self.nodes.remove_if(&node, |_, objects| objects.is_empty());
        remaining
    }

    pub fn count(&self, node: NodeId, object: ObjectId) -> u64 {
        self.nodes
            .get(&node)
            .and_then(|objects| objects.get(&object).copied())
            .unwrap_or(0)
    }

    /// Number of nodes with at least one live conflict
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn snapshot(&self) -> ConflictMap {
        self.nodes
            .iter()
            .map(|entry| {
                let objects = entry.value().iter().map(|(o, n)| (*o, *n)).collect();
                (*entry.key(), objects)
            })
            .collect()
    }
}
