//! Incremental strategy: the identity graph is maintained on every update
//!
//! For each object a task touched, the owner's access count is bumped and
//! every other identity with a live count on that object becomes a neighbor.
//! A missing edge is created with weight 1. An existing edge is incremented
//! only while the owner's count on the object has not overtaken the peer's,
//! so across shared objects an edge weighs Σ min(count_owner, count_peer).
//!
//! Lock order is graph lock → access shard / period lock. The prune pass
//! takes the graph lock for edge decay and releases it before touching access
//! shards.

use super::{decay_edges, GraphBuilder, GraphSize};
use crate::access::{AccessRecorder, ObjectUseMap};
use crate::conflict::ConflictTracker;
use crate::graph::{AffinityGraph, AffinityGraphSnapshot, Vertex};
use crate::identity::{Identity, ObjectId};
use crate::pruner::{Period, WindowedPruner};
use crate::stats::BuilderStats;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct WeightedGraphBuilder {
    graph: Mutex<AffinityGraph>,
    accesses: AccessRecorder,
    conflicts: ConflictTracker,
    pruner: WindowedPruner,
    stats: BuilderStats,
}

impl WeightedGraphBuilder {
    pub fn new(pruner: WindowedPruner) -> Self {
        Self {
            graph: Mutex::new(AffinityGraph::new()),
            accesses: AccessRecorder::new(),
            conflicts: ConflictTracker::new(),
            pruner,
            stats: BuilderStats::new(),
        }
    }

    /// Current access counts
    pub fn accesses(&self) -> &AccessRecorder {
        &self.accesses
    }
}

impl GraphBuilder for WeightedGraphBuilder {
    fn update_graph(&self, owner: &Identity, objects: &[ObjectId]) {
        self.stats.record_update();
        let owner_vertex = Vertex::new(owner.clone());

        // Held for the whole task so concurrent callers serialize here
        let mut graph = self.graph.lock();
        for object in objects {
            let access = self.accesses.record_access(*object, owner);
            self.pruner.record_access_increment(*object, owner);

            for (peer, peer_count) in &access.peers {
                let peer_vertex = Vertex::new(peer.clone());
                let edge = match graph.find_edge(&owner_vertex, &peer_vertex) {
                    None => graph.increment_edge(&owner_vertex, &peer_vertex),
                    Some(edge) if access.count <= *peer_count => {
                        graph.add_weight(edge, 1);
                        edge
                    }
                    Some(_) => continue,
                };
                self.pruner.record_edge_increment(edge);
            }
        }
    }

    fn affinity_graph(&self) -> AffinityGraphSnapshot {
        self.graph.lock().snapshot()
    }

    fn vertex(&self, identity: &Identity) -> Option<Vertex> {
        self.graph
            .lock()
            .vertex(&Vertex::new(identity.clone()))
            .cloned()
    }

    fn object_use_map(&self) -> ObjectUseMap {
        self.accesses.snapshot()
    }

    fn graph_size(&self) -> GraphSize {
        let graph = self.graph.lock();
        GraphSize {
            vertices: graph.vertex_count(),
            edges: graph.edge_count(),
        }
    }

    fn tracked_objects(&self) -> usize {
        self.accesses.len()
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

        for (object, identities) in &period.accesses {
            for (identity, delta) in identities {
                self.accesses.decay(*object, identity, *delta);
            }
        }
    }
}
