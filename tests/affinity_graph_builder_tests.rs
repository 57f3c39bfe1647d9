//! Integration tests for the affinity graph builder façade
//!
//! Every scenario runs against both graph-building strategies; they must agree
//! on the folded identity graph.
//!
//! # Test Coverage
//!
//! - ✅ Single access, one edge, repeated access weighting
//! - ✅ Four-report scenario and three identities on one object
//! - ✅ Vertex lookup
//! - ✅ Window of one period (two ticks empty the graph)
//! - ✅ Conflict recording, node removal, invalid arguments
//! - ✅ Lifecycle: disable, enable, shutdown

use affinity_graph::{
    AffinityConfig, AffinityError, AffinityGraphBuilder, AffinityGraphSnapshot, BuilderKind,
    Identity, LifecycleState, NodeId, ObjectId,
};
use std::time::Duration;

const KINDS: [BuilderKind; 2] = [BuilderKind::Weighted, BuilderKind::Bipartite];

/// Builder whose background timer never fires during a test
fn manual_builder(kind: BuilderKind, window: usize) -> AffinityGraphBuilder {
    AffinityGraphBuilder::new(
        AffinityConfig::new(Duration::from_secs(3600), window).with_builder(kind),
    )
    .unwrap()
}

fn id(name: &str) -> Identity {
    Identity::new(name)
}

fn obj(n: u64) -> ObjectId {
    ObjectId(n)
}

fn four_reports(builder: &AffinityGraphBuilder) {
    builder.update_graph(&id("A"), &[obj(1), obj(2)]).unwrap();
    builder.update_graph(&id("B"), &[obj(1), obj(3)]).unwrap();
    builder
        .update_graph(&id("C"), &[obj(4), obj(2), obj(3)])
        .unwrap();
    builder.update_graph(&id("D"), &[obj(4)]).unwrap();
    // A now uses o3 too, linking it again with B and C
    builder.update_graph(&id("A"), &[obj(3)]).unwrap();
}

fn assert_weights(graph: &AffinityGraphSnapshot, ab: u64, ac: u64, bc: u64, cd: u64) {
    assert_eq!(graph.vertex_count(), 4);
    assert_eq!(graph.edge_count(), 4);
    assert_eq!(graph.weight(&id("A"), &id("B")), Some(ab));
    assert_eq!(graph.weight(&id("A"), &id("C")), Some(ac));
    assert_eq!(graph.weight(&id("B"), &id("C")), Some(bc));
    assert_eq!(graph.weight(&id("C"), &id("D")), Some(cd));
}

#[test]
fn test_no_objects() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("something"), &[]).unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }
}

#[test]
fn test_one_access_creates_no_vertex() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("something"), &[obj(1)]).unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(builder.object_use_map()[&obj(1)][&id("something")], 1);
    }
}

#[test]
fn test_one_edge() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("something"), &[obj(1)]).unwrap();
        builder.update_graph(&id("somethingElse"), &[obj(1)]).unwrap();

        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.edges()[0].weight, 1);
    }
}

#[test]
fn test_one_edge_twice_keeps_weight() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("something"), &[obj(1)]).unwrap();
        builder.update_graph(&id("somethingElse"), &[obj(1)]).unwrap();
        builder.update_graph(&id("something"), &[obj(1)]).unwrap();

        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges()[0].weight, 1);
    }
}

#[test]
fn test_inc_edge_weight() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        let s = id("something");
        let e = id("somethingElse");
        builder.update_graph(&s, &[obj(1)]).unwrap();
        builder.update_graph(&e, &[obj(1), obj(1)]).unwrap();
        assert_eq!(builder.affinity_graph().weight(&s, &e), Some(1));

        builder.update_graph(&s, &[obj(1)]).unwrap();
        assert_eq!(builder.affinity_graph().weight(&s, &e), Some(2));

        // s now leads e on o1; the edge does not grow
        builder.update_graph(&s, &[obj(1)]).unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.weight(&s, &e), Some(2));
    }
}

#[test]
fn test_four_reports() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        four_reports(&builder);
        assert_weights(&builder.affinity_graph(), 2, 2, 1, 1);
    }
}

#[test]
fn test_three_identities_many_accesses_one_object() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("A"), &[obj(1)]).unwrap();
        builder.update_graph(&id("A"), &[obj(1)]).unwrap();
        builder
            .update_graph(&id("B"), &[obj(1), obj(1), obj(1)])
            .unwrap();
        builder.update_graph(&id("C"), &[obj(1), obj(1)]).unwrap();

        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.vertex_count(), 3);
        assert!(graph.edges().iter().all(|e| e.weight == 2));
    }
}

#[test]
fn test_vertex_lookup() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        assert!(builder.vertex(&id("None")).is_none());

        builder.update_graph(&id("A"), &[obj(1)]).unwrap();
        builder.update_graph(&id("A"), &[obj(1)]).unwrap();
        assert!(builder.vertex(&id("A")).is_none());
        assert!(builder.vertex(&id("B")).is_none());

        builder.update_graph(&id("B"), &[obj(1)]).unwrap();
        assert_eq!(builder.vertex(&id("B")).unwrap().identity(), &id("B"));
        assert_eq!(builder.vertex(&id("A")).unwrap().identity(), &id("A"));
    }
}

#[test]
fn test_example_scenario() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("A"), &[obj(1)]).unwrap();
        builder.update_graph(&id("B"), &[obj(1)]).unwrap();
        assert_eq!(builder.affinity_graph().weight(&id("A"), &id("B")), Some(1));

        // O2 has a single accessor: no new edge
        builder.update_graph(&id("B"), &[obj(2)]).unwrap();
        assert_eq!(builder.affinity_graph().edge_count(), 1);

        builder.prune_now().unwrap();
        assert_eq!(builder.affinity_graph().edge_count(), 1);
        builder.prune_now().unwrap();
        let graph = builder.affinity_graph();
        assert!(graph.is_empty());
        assert!(!graph.contains_vertex(&id("A")));
        assert!(!graph.contains_vertex(&id("B")));
        assert!(builder.object_use_map().is_empty());
    }
}

#[test]
fn test_graph_pruner_window_one() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        four_reports(&builder);
        builder.prune_now().unwrap();
        // Second period: nothing added, so the graph empties out
        builder.prune_now().unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.vertex_count(), 0);
    }
}

#[test]
fn test_note_conflict_detected() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        let node = NodeId(99);
        builder
            .note_conflict_detected(Some(obj(10)), node, false)
            .unwrap();
        let map = builder.conflict_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&node][&obj(10)], 1);

        builder
            .note_conflict_detected(Some(obj(10)), node, false)
            .unwrap();
        builder
            .note_conflict_detected(Some(obj(11)), node, true)
            .unwrap();
        let map = builder.conflict_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&node][&obj(10)], 2);
        assert_eq!(map[&node][&obj(11)], 1);
    }
}

#[test]
fn test_note_conflict_detected_bad_object() {
    let builder = manual_builder(BuilderKind::Weighted, 1);
    let err = builder
        .note_conflict_detected(None, NodeId(1), false)
        .unwrap_err();
    assert!(matches!(err, AffinityError::InvalidArgument(_)));
    assert!(builder.conflict_map().is_empty());
}

#[test]
fn test_remove_node() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        let node = NodeId(99);
        let bad_node = NodeId(102);
        builder
            .note_conflict_detected(Some(obj(10)), node, false)
            .unwrap();
        builder
            .note_conflict_detected(Some(obj(10)), bad_node, false)
            .unwrap();
        builder
            .note_conflict_detected(Some(obj(11)), bad_node, false)
            .unwrap();
        builder
            .note_conflict_detected(Some(obj(11)), bad_node, true)
            .unwrap();
        let map = builder.conflict_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&bad_node][&obj(11)], 2);

        builder.remove_node(bad_node).unwrap();
        let map = builder.conflict_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&node][&obj(10)], 1);
        assert!(!map.contains_key(&bad_node));

        // Pruning the period that recorded bad_node's conflicts is harmless
        builder.prune_now().unwrap();
        builder.prune_now().unwrap();
        assert!(builder.conflict_map().is_empty());
    }
}

#[test]
fn test_remove_unknown_node_twice() {
    let builder = manual_builder(BuilderKind::Weighted, 1);
    builder.remove_node(NodeId(22)).unwrap();
    builder.remove_node(NodeId(35)).unwrap();
    builder.remove_node(NodeId(35)).unwrap();
}

#[test]
fn test_bad_period_count() {
    let err = AffinityGraphBuilder::new(AffinityConfig::new(Duration::from_secs(1), 0))
        .unwrap_err();
    assert!(matches!(err, AffinityError::InvalidConfig(_)));
}

#[test]
fn test_enable_disable_twice() {
    let builder = manual_builder(BuilderKind::Weighted, 1);
    builder.enable().unwrap();
    builder.enable().unwrap();
    builder.disable().unwrap();
    builder.disable().unwrap();
    assert_eq!(builder.state(), LifecycleState::Disabled);
}

#[test]
fn test_shutdown_twice() {
    let builder = manual_builder(BuilderKind::Weighted, 1);
    builder.shutdown();
    builder.shutdown();
    assert_eq!(builder.state(), LifecycleState::Shutdown);
    assert!(!builder.pruner_running());
}

#[test]
fn test_shutdown_then_enable_or_disable() {
    let builder = manual_builder(BuilderKind::Weighted, 1);
    builder.shutdown();
    assert!(matches!(builder.enable(), Err(AffinityError::ShutDown)));
    assert!(matches!(builder.disable(), Err(AffinityError::ShutDown)));
}

#[test]
fn test_shutdown_then_update() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.shutdown();
        let err = builder.update_graph(&id("something"), &[obj(1)]).unwrap_err();
        assert!(matches!(err, AffinityError::ShutDown));
        assert_eq!(err.to_string(), "Affinity graph builder is already shut down");
    }
}

#[test]
fn test_disable_ignores_updates() {
    for kind in KINDS {
        let builder = manual_builder(kind, 1);
        builder.update_graph(&id("something"), &[obj(1)]).unwrap();
        builder
            .update_graph(&id("somethingElse"), &[obj(1), obj(1)])
            .unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.vertex_count(), 2);

        builder.disable().unwrap();
        builder
            .update_graph(&id("somethingDifferent"), &[obj(1)])
            .unwrap();
        builder
            .note_conflict_detected(Some(obj(1)), NodeId(3), false)
            .unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.vertex_count(), 2);
        assert!(builder.conflict_map().is_empty());

        builder.enable().unwrap();
        builder
            .update_graph(&id("somethingDifferent"), &[obj(1)])
            .unwrap();
        let graph = builder.affinity_graph();
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.vertex_count(), 3);
    }
}

#[test]
fn test_drop_joins_timer() {
    let builder = AffinityGraphBuilder::new(AffinityConfig::new(Duration::from_millis(5), 1))
        .unwrap();
    builder.update_graph(&id("A"), &[obj(1)]).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    drop(builder);
}
