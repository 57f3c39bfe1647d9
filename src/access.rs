//! Per-object access counts (object → identity → count)
//!
//! The writer increments counts as tasks complete; the pruner decrements them
//! when the period that produced them expires. Each object's identity map lives
//! in its own `DashMap` entry, so an increment and a decrement on the same
//! object serialize on that entry's shard lock and never on a global lock.

use crate::identity::{Identity, ObjectId};
use dashmap::DashMap;
use fnv::FnvHashMap;
use std::collections::HashMap;

/// Owned snapshot of the access table, as handed to label propagation
pub type ObjectUseMap = HashMap<ObjectId, HashMap<Identity, u64>>;

/// Result of recording one access
///
/// `peers` holds every *other* identity with a live count on the object,
/// captured under the same shard lock as the increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub count: u64,
    pub peers: Vec<(Identity, u64)>,
}

#[derive(Debug, Default)]
pub struct AccessRecorder {
    objects: DashMap<ObjectId, FnvHashMap<Identity, u64>>,
}

impl AccessRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the (object, identity) count, creating the object map on first use
    pub fn record_access(&self, object: ObjectId, identity: &Identity) -> AccessOutcome {
        let mut ids = self.objects.entry(object).or_default();
        let count = {
            let slot = ids.entry(identity.clone()).or_insert(0);
            *slot += 1;
            *slot
        };
        let peers = ids
            .iter()
            .filter(|(id, _)| *id != identity)
            .map(|(id, n)| (id.clone(), *n))
            .collect();
        AccessOutcome { count, peers }
    }

    /// Subtract `amount` from the (object, identity) count
    ///
    /// Entries reaching zero are dropped, and so is the object once its map is
    /// empty. Returns the remaining count (0 when the entry is gone or was
    /// never present).
    pub fn decay(&self, object: ObjectId, identity: &Identity, amount: u64) -> u64 {
        let remaining = match self.objects.get_mut(&object) {
            Some(mut ids) => {
                let current = ids.get(identity).copied();
                let remaining = match current {
                    Some(count) if count > amount => {
                        ids.insert(identity.clone(), count - amount);
                        count - amount
                    }
                    Some(_) => {
                        ids.remove(identity);
                        0
                    }
                    None => {
                        tracing::warn!(
                            "Access decay for untracked pair ({}, {})",
                            object,
                            identity
                        );
                        0
                    }
                };
                remaining
            }
            None => {
                tracing::warn!("Access decay for untracked object {}", object);
                return 0;
            }
        };
        // The RefMut above is released; re-check emptiness under the shard lock.
        self.objects.remove_if(&object, |_, ids| ids.is_empty());
        remaining
    }

    pub fn count(&self, object: ObjectId, identity: &Identity) -> u64 {
        self.objects
            .get(&object)
            .and_then(|ids| ids.get(identity).copied())
            .unwrap_or(0)
    }

    /// Every identity with a live count on `object`
    pub fn accessors(&self, object: ObjectId) -> Vec<(Identity, u64)> {
        self.objects
            .get(&object)
            .map(|ids| ids.iter().map(|(id, n)| (id.clone(), *n)).collect())
            .unwrap_or_default()
    }

    /// Number of objects with at least one live access
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn snapshot(&self) -> ObjectUseMap {
        self.objects
            .iter()
            .map(|entry| {
                let ids = entry
                    .value()
                    .iter()
                    .map(|(id, n)| (id.clone(), *n))
                    .collect();
                (*entry.key(), ids)
            })
            .collect()
    }
}
