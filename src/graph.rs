//! Undirected weighted graph used by both graph-building strategies
//!
//! `WeightedGraph<V>` is a plain adjacency-map graph with integer edge
//! weights. The weighted strategy instantiates it over identity vertices
//! ([`AffinityGraph`]); the bipartite strategy instantiates it over the tagged
//! [`BipartiteVertex`] type.
//!
//! # Invariants
//!
//! - At most one edge between any two vertices, and no self-loops.
//! - Every edge has weight > 0; an edge decayed to zero is removed.
//! - An edge removal also removes each endpoint left with degree 0.
//!
//! Edges carry a stable [`EdgeId`] so pruning records can name the exact edge
//! instance they incremented, even if an edge between the same pair is later
//! removed and recreated.
//!
//! The graph is not synchronized. Owners wrap it in their graph lock and hand
//! readers an owned [`AffinityGraphSnapshot`] instead of a reference.

use crate::identity::{Identity, ObjectId};
use fnv::FnvHashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Stable handle for one edge instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity vertex of the folded affinity graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Vertex {
    identity: Identity,
}

impl Vertex {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Vertex of the identity-object graph kept by the bipartite strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BipartiteVertex {
    Identity(Identity),
    Object(ObjectId),
}

/// Graph over identity vertices
pub type AffinityGraph = WeightedGraph<Vertex>;

/// Graph over identity and object vertices
pub type BipartiteGraph = WeightedGraph<BipartiteVertex>;

#[derive(Debug, Clone)]
struct EdgeRecord<V> {
    ends: (V, V),
    weight: u64,
}

/// Borrowed view of one edge
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'a, V> {
    pub id: EdgeId,
    pub a: &'a V,
    pub b: &'a V,
    pub weight: u64,
}

/// Outcome of [`WeightedGraph::decay_edge`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecay<V> {
    /// Weight reduced; the edge is still present
    Decayed { remaining: u64 },
    /// Edge removed, along with any endpoints left at degree 0
    ///
    /// `shortfall` is how far the requested decay overshot the live weight.
    /// It is zero under correct bookkeeping.
    Removed { orphaned: Vec<V>, shortfall: u64 },
}

#[derive(Debug, Clone)]
pub struct WeightedGraph<V> {
    adjacency: HashMap<V, HashMap<V, EdgeId>>,
    edges: FnvHashMap<EdgeId, EdgeRecord<V>>,
    next_edge: u64,
}

impl<V> Default for WeightedGraph<V> {
    fn default() -> Self {
        Self {
            adjacency: HashMap::new(),
            edges: FnvHashMap::default(),
            next_edge: 0,
        }
    }
}

impl<V: Clone + Eq + Hash> WeightedGraph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn contains_vertex(&self, v: &V) -> bool {
        self.adjacency.contains_key(v)
    }

    /// Lookup only: the stored vertex equal to `v`, if present
    pub fn vertex(&self, v: &V) -> Option<&V> {
        self.adjacency.get_key_value(v).map(|(k, _)| k)
    }

    /// Get-or-create the adjacency row of `v`
    ///
    /// Only reached while attaching an edge, so no vertex stays at degree 0.
    fn add_or_get_vertex(&mut self, v: &V) -> &mut HashMap<V, EdgeId> {
        self.adjacency.entry(v.clone()).or_default()
    }

    pub fn degree(&self, v: &V) -> usize {
        self.adjacency.get(v).map_or(0, HashMap::len)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.adjacency.keys()
    }

    pub fn neighbors<'a>(&'a self, v: &V) -> impl Iterator<Item = (&'a V, u64)> + 'a {
        self.adjacency
            .get(v)
            .into_iter()
            .flat_map(move |adj| adj.iter().map(move |(n, id)| (n, self.edges[id].weight)))
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_, V>> {
        self.edges.iter().map(|(id, e)| EdgeRef {
            id: *id,
            a: &e.ends.0,
            b: &e.ends.1,
            weight: e.weight,
        })
    }

    pub fn find_edge(&self, a: &V, b: &V) -> Option<EdgeId> {
        self.adjacency.get(a).and_then(|adj| adj.get(b)).copied()
    }

    pub fn weight(&self, id: EdgeId) -> Option<u64> {
        self.edges.get(&id).map(|e| e.weight)
    }

    /// Add 1 to the edge between `a` and `b`, creating a weight-1 edge (and
    /// any missing endpoint) if none exists
    ///
    /// # Panics
    ///
    /// Panics if `a == b`: the graph has no self-loops.
    pub fn increment_edge(&mut self, a: &V, b: &V) -> EdgeId {
        assert!(a != b, "self-loop edges are not allowed");

        if let Some(id) = self.find_edge(a, b) {
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.weight += 1;
            }
            return id;
        }

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.add_or_get_vertex(a).insert(b.clone(), id);
        self.add_or_get_vertex(b).insert(a.clone(), id);
        self.edges.insert(
            id,
            EdgeRecord {
                ends: (a.clone(), b.clone()),
                weight: 1,
            },
        );
        id
    }

    /// Add `amount` to an existing edge; returns the new weight
    pub fn add_weight(&mut self, id: EdgeId, amount: u64) -> Option<u64> {
        let edge = self.edges.get_mut(&id)?;
        edge.weight += amount;
        Some(edge.weight)
    }

    /// Subtract `amount` from an edge, removing it once its weight would
    /// reach zero
    ///
    /// Returns `None` if the edge does not exist.
    pub fn decay_edge(&mut self, id: EdgeId, amount: u64) -> Option<EdgeDecay<V>> {
        let edge = self.edges.get_mut(&id)?;
        if edge.weight > amount {
            edge.weight -= amount;
            return Some(EdgeDecay::Decayed {
                remaining: edge.weight,
            });
        }
        let shortfall = amount - edge.weight;
        let orphaned = self.remove_edge(id).unwrap_or_default();
        Some(EdgeDecay::Removed {
            orphaned,
            shortfall,
        })
    }

    /// Remove an edge and any endpoint left at degree 0
    ///
    /// Returns the removed endpoints, or `None` if the edge does not exist.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Vec<V>> {
        let EdgeRecord { ends: (a, b), .. } = self.edges.remove(&id)?;
        let mut orphaned = Vec::new();
        for (end, other) in [(a.clone(), &b), (b.clone(), &a)] {
            let now_empty = match self.adjacency.get_mut(&end) {
                Some(adj) => {
                    adj.remove(other);
                    adj.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.adjacency.remove(&end);
                orphaned.push(end);
            }
        }
        Some(orphaned)
    }
}

impl AffinityGraph {
    /// Owned copy of the identity graph for readers
    pub fn snapshot(&self) -> AffinityGraphSnapshot {
        AffinityGraphSnapshot::from_edges(self.edges().map(|e| {
            (
                e.a.identity().clone(),
                e.b.identity().clone(),
                e.weight,
            )
        }))
    }
}

/// One edge of an [`AffinityGraphSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEdge {
    pub a: Identity,
    pub b: Identity,
    pub weight: u64,
}

/// Immutable view of the identity affinity graph
///
/// Built under the owner's graph lock, so every weight in it was read whole.
/// It never changes afterwards and can be shared freely.
///
/// # Example
///
/// ```
/// use affinity_graph::graph::AffinityGraphSnapshot;
/// use affinity_graph::identity::Identity;
///
/// let a = Identity::new("a");
/// let b = Identity::new("b");
/// let snap = AffinityGraphSnapshot::from_edges([
///     (a.clone(), b.clone(), 2),
///     (b.clone(), a.clone(), 1),
/// ]);
/// assert_eq!(snap.edge_count(), 1);
/// assert_eq!(snap.weight(&a, &b), Some(3));
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct AffinityGraphSnapshot {
    vertices: Vec<Identity>,
    edges: Vec<SnapshotEdge>,
    #[serde(skip)]
    adjacency: HashMap<Identity, HashMap<Identity, usize>>,
}

impl AffinityGraphSnapshot {
    /// Build a snapshot from (a, b, weight) triples
    ///
    /// Parallel entries for the same unordered pair are summed; self-pairs
    /// and zero weights are dropped.
    pub fn from_edges<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (Identity, Identity, u64)>,
    {
        let mut snap = Self::default();
        for (a, b, weight) in triples {
            if a == b || weight == 0 {
                continue;
            }
            if let Some(idx) = snap.adjacency.get(&a).and_then(|adj| adj.get(&b)).copied() {
                snap.edges[idx].weight += weight;
                continue;
            }
            let idx = snap.edges.len();
            for (from, to) in [(&a, &b), (&b, &a)] {
                if !snap.adjacency.contains_key(from) {
                    snap.vertices.push(from.clone());
                }
                snap.adjacency
                    .entry(from.clone())
                    .or_default()
                    .insert(to.clone(), idx);
            }
            snap.edges.push(SnapshotEdge { a, b, weight });
        }
        snap
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Identity] {
        &self.vertices
    }

    pub fn edges(&self) -> &[SnapshotEdge] {
        &self.edges
    }

    pub fn contains_vertex(&self, identity: &Identity) -> bool {
        self.adjacency.contains_key(identity)
    }

    pub fn weight(&self, a: &Identity, b: &Identity) -> Option<u64> {
        self.adjacency
            .get(a)
            .and_then(|adj| adj.get(b))
            .map(|idx| self.edges[*idx].weight)
    }

    pub fn degree(&self, identity: &Identity) -> usize {
        self.adjacency.get(identity).map_or(0, HashMap::len)
    }

    pub fn neighbors(&self, identity: &Identity) -> Vec<(Identity, u64)> {
        self.adjacency
            .get(identity)
            .map(|adj| {
                adj.iter()
                    .map(|(n, idx)| (n.clone(), self.edges[*idx].weight))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn total_weight(&self) -> u64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// The `n` heaviest edges, heaviest first (ties broken by identity names)
    pub fn heaviest_edges(&self, n: usize) -> Vec<SnapshotEdge> {
        let mut edges = self.edges.clone();
        let ordered = |e: &SnapshotEdge| {
            if e.a <= e.b {
                (e.a.clone(), e.b.clone())
            } else {
                (e.b.clone(), e.a.clone())
            }
        };
        edges.sort_by(|x, y| {
            y.weight
                .cmp(&x.weight)
                .then_with(|| ordered(x).cmp(&ordered(y)))
        });
        edges.truncate(n);
        edges
    }
}
