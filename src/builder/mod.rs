//! Graph-building strategies
//!
//! Two interchangeable implementations of [`GraphBuilder`]:
//!
//! - [`WeightedGraphBuilder`]: keeps the identity graph up to date on every
//!   update. Reads copy it; writes pay for edge maintenance.
//! - [`BipartiteGraphBuilder`]: keeps an identity↔object graph and folds it
//!   into the identity graph on every read. Writes are cheap; reads are not.
//!
//! Both share the windowed pruner, the conflict table and the stats counters.
//! The prune pass itself ([`GraphBuilder::prune_tick`]) is written once here;
//! each strategy only supplies how an expired [`Period`] is reversed against
//! its own structures.

pub mod bipartite;
pub mod weighted;

pub use bipartite::BipartiteGraphBuilder;
pub use weighted::WeightedGraphBuilder;

use crate::access::ObjectUseMap;
use crate::config::{AffinityConfig, BuilderKind};
use crate::conflict::ConflictTracker;
use crate::graph::{AffinityGraphSnapshot, EdgeDecay, EdgeId, Vertex, WeightedGraph};
use crate::identity::{Identity, NodeId, ObjectId};
use crate::pruner::{Period, Rotation, WindowedPruner};
use crate::stats::BuilderStats;
use fnv::FnvHashMap;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// What one prune tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PruneOutcome {
    /// The window is still filling; nothing was reversed
    Warming { sealed: usize },
    /// The oldest period was reversed; counts are the keys it touched
    Expired {
        edges: usize,
        accesses: usize,
        conflicts: usize,
    },
}

impl PruneOutcome {
    pub fn expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

/// Vertex and edge counts of the live identity graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphSize {
    pub vertices: usize,
    pub edges: usize,
}

pub trait GraphBuilder: Send + Sync + fmt::Debug {
    /// Fold one completed task into the graph
    fn update_graph(&self, owner: &Identity, objects: &[ObjectId]);

    /// Owned copy of the identity affinity graph
    fn affinity_graph(&self) -> AffinityGraphSnapshot;

    /// Lookup only; `None` if the identity has no live edges
    fn vertex(&self, identity: &Identity) -> Option<Vertex>;

    fn object_use_map(&self) -> ObjectUseMap;

    fn graph_size(&self) -> GraphSize;

    /// Number of objects with at least one live access
    fn tracked_objects(&self) -> usize;

    fn conflicts(&self) -> &ConflictTracker;

    fn pruner(&self) -> &WindowedPruner;

    fn stats(&self) -> &BuilderStats;

    /// Reverse the edge and access deltas of an expired period
    ///
    /// # Panics
    ///
    /// Implementations panic if the period names an edge that no longer
    /// exists: the graph and the period ledger have diverged.
    fn expire_period(&self, period: &Period);

    fn note_conflict(&self, object: ObjectId, node: NodeId) {
        self.conflicts().note_conflict(object, node);
        self.pruner().record_conflict_increment(node, object);
        self.stats().record_conflict();
    }

    fn remove_node(&self, node: NodeId) -> bool {
        self.conflicts().remove_node(node)
    }

    /// Seal the current period and reverse the one falling out of the window
    fn prune_tick(&self) -> PruneOutcome {
        let start = Instant::now();
        self.stats().record_prune();

        let outcome = match self.pruner().rotate() {
            Rotation::Warming { sealed } => PruneOutcome::Warming { sealed },
            Rotation::Expired(period) => {
                self.expire_period(&period);
                for (node, objects) in &period.conflicts {
                    for (object, delta) in objects {
                        self.conflicts().decay(*node, *object, *delta);
                    }
                }
                PruneOutcome::Expired {
                    edges: period.edges.len(),
                    accesses: period.accesses.values().map(|ids| ids.len()).sum(),
                    conflicts: period.conflicts.values().map(|objs| objs.len()).sum(),
                }
            }
        };

        let elapsed = start.elapsed();
        self.stats().add_processing_time(elapsed);
        tracing::debug!(
            "Prune tick {}: {:?} in {:?}",
            self.pruner().ticks(),
            outcome,
            elapsed
        );
        outcome
    }
}

/// Reverse recorded edge increments against `graph`
///
/// An edge whose live weight equals its delta is removed together with any
/// endpoint left at degree 0; otherwise its weight is reduced by the delta.
///
/// # Panics
///
/// Panics if an edge named in `deltas` does not exist.
pub(crate) fn decay_edges<V>(graph: &mut WeightedGraph<V>, deltas: &FnvHashMap<EdgeId, u64>)
where
    V: Clone + Eq + Hash + fmt::Debug,
{
    for (edge, delta) in deltas {
        match graph.decay_edge(*edge, *delta) {
            None => panic!("edge {} missing during decay", edge),
            Some(EdgeDecay::Removed {
                orphaned,
                shortfall,
            }) => {
                if shortfall > 0 {
                    tracing::error!(
                        "Edge {} decayed by {} but only held {}; removed",
                        edge,
                        delta,
                        delta - shortfall
                    );
                    debug_assert_eq!(shortfall, 0, "edge weight below period delta");
                }
                if !orphaned.is_empty() {
                    tracing::trace!("Removed orphaned vertices {:?}", orphaned);
                }
            }
            Some(EdgeDecay::Decayed { .. }) => {}
        }
    }
}

/// Build the strategy selected by `config.builder`
pub fn from_config(config: &AffinityConfig) -> Arc<dyn GraphBuilder> {
    let pruner = WindowedPruner::new(config.period_count, config.snapshot());
    match config.builder {
        BuilderKind::Weighted => Arc::new(WeightedGraphBuilder::new(pruner)),
        BuilderKind::Bipartite => Arc::new(BipartiteGraphBuilder::new(pruner)),
    }
}
