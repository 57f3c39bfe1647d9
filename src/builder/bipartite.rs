//! Lazy strategy: an identity↔object graph folded into identities on read
//!
//! An update only bumps the (identity, object) edges, so the edge weight is
//! the identity's access count on that object. Reading the affinity graph
//! folds through every object vertex: each pair of identities sharing the
//! object gains `min(weight_a, weight_b)`, summed over all shared objects.
//!
//! ```text
//!   a ──2── o1 ──1── b          a ──1── b
//!   a ──1── o2 ──3── b    ⇒     (min(2,1) + min(1,3) = 2)
//! ```
//!
//! Only identities with at least one folded edge appear in the result.

use super::{decay_edges, GraphBuilder, GraphSize};
use crate::access::ObjectUseMap;
use crate::conflict::ConflictTracker;
use crate::graph::{AffinityGraphSnapshot, BipartiteGraph, BipartiteVertex, Vertex};
use crate::identity::{Identity, ObjectId};
use crate::pruner::{Period, WindowedPruner};
use crate::stats::BuilderStats;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct BipartiteGraphBuilder {
    graph: Mutex<BipartiteGraph>,
    conflicts: ConflictTracker,
    pruner: WindowedPruner,
    stats: BuilderStats,
}

impl BipartiteGraphBuilder {
    pub fn new(pruner: WindowedPruner) -> Self {
        Self {
            graph: Mutex::new(BipartiteGraph::new()),
            conflicts: ConflictTracker::new(),
            pruner,
            stats: BuilderStats::new(),
        }
    }

    /// Accessors of every object with more than one identity
    ///
    /// Copied under the graph lock so the fold can run without it.
    fn shared_objects(&self) -> Vec<Vec<(Identity, u64)>> {
        let graph = self.graph.lock();
        graph
            .vertices()
            .filter(|v| matches!(v, BipartiteVertex::Object(_)) && graph.degree(v) > 1)
            .map(|object| {
                graph
                    .neighbors(object)
                    .filter_map(|(v, weight)| match v {
                        BipartiteVertex::Identity(id) => Some((id.clone(), weight)),
                        BipartiteVertex::Object(_) => None,
                    })
                    .collect()
            })
            .collect()
    }
}

impl GraphBuilder for BipartiteGraphBuilder {
    fn update_graph(&self, owner: &Identity, objects: &[ObjectId]) {
        self.stats.record_update();
        let who = BipartiteVertex::Identity(owner.clone());

        let mut graph = self.graph.lock();
        for object in objects {
            let edge = graph.increment_edge(&who, &BipartiteVertex::Object(*object));
            self.pruner.record_edge_increment(edge);
        }
    }

    fn affinity_graph(&self) -> AffinityGraphSnapshot {
        let shared = self.shared_objects();
        AffinityGraphSnapshot::from_edges(shared.iter().flat_map(|accessors| {
            accessors.iter().enumerate().flat_map(move |(i, (a, wa))| {
                accessors[i + 1..]
                    .iter()
                    .map(move |(b, wb)| (a.clone(), b.clone(), (*wa).min(*wb)))
            })
        }))
    }

    fn vertex(&self, identity: &Identity) -> Option<Vertex> {
        let graph = self.graph.lock();
        let who = BipartiteVertex::Identity(identity.clone());
        let shares = graph
            .neighbors(&who)
            .any(|(object, _)| graph.degree(object) > 1);
        shares.then(|| Vertex::new(identity.clone()))
    }

    fn object_use_map(&self) -> ObjectUseMap {
        let graph = self.graph.lock();
        graph
            .vertices()
            .filter_map(|v| match v {
                BipartiteVertex::Object(object) => Some((*object, v)),
                BipartiteVertex::Identity(_) => None,
            })
            .map(|(object, v)| {
                let ids = graph
                    .neighbors(v)
                    .filter_map(|(n, weight)| match n {
                        BipartiteVertex::Identity(id) => Some((id.clone(), weight)),
                        BipartiteVertex::Object(other) => {
                            tracing::warn!("Object {} linked to object {}", object, other);
                            None
                        }
                    })
                    .collect();
                (object, ids)
            })
            .collect()
    }

    fn graph_size(&self) -> GraphSize {
        let folded = self.affinity_graph();
        GraphSize {
            vertices: folded.vertex_count(),
            edges: folded.edge_count(),
        }
    }

    fn tracked_objects(&self) -> usize {
        self.graph
            .lock()
            .vertices()
            .filter(|v| matches!(v, BipartiteVertex::Object(_)))
            .count()
    }

    fn conflicts(&self) -> &ConflictTracker {
        &self.conflicts
    }

    fn pruner(&self) -> &WindowedPruner {
        &self.pruner
    }

    fn stats(&self) -> &BuilderStats {
        &self.stats
    }

    fn expire_period(&self, period: &Period) {
        decay_edges(&mut *self.graph.lock(), &period.edges);
    }
}
