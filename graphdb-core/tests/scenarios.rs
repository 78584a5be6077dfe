//! End-to-end scenarios exercising the public `StorageEngine` / `GraphEngine`
//! surface rather than internals.

use graphdb_core::{GraphEngine, PropertyMap, PropertyValue, StorageEngine};
use std::collections::HashSet;
use tempfile::TempDir;

fn text(s: &str) -> PropertyMap {
    let mut m = PropertyMap::new();
    m.insert("name", PropertyValue::Text(s.as_bytes().to_vec()));
    m
}

#[test]
fn round_trip_property_map_across_all_six_types() {
    let dir = TempDir::new().unwrap();
    let mut engine = StorageEngine::open(dir.path(), "scenarios").unwrap();

    let mut props = PropertyMap::new();
    props.insert("flag", PropertyValue::Bool(true));
    props.insert("count", PropertyValue::Int(-7));
    props.insert("score", PropertyValue::Float(2.5));
    props.insert("grade", PropertyValue::Char('B'));
    props.insert("bio", PropertyValue::Text(b"hello world".to_vec()));

    let id = engine.create_node(&props).unwrap();
    let fetched = engine.get_node(id).unwrap();
    assert_eq!(fetched.props.iter().collect::<Vec<_>>(), props.iter().collect::<Vec<_>>());
}

#[test]
fn id_monotonicity_holds_across_deletes_and_reopen() {
    let dir = TempDir::new().unwrap();
    let mut ids = Vec::new();
    {
        let mut engine = StorageEngine::open(dir.path(), "scenarios").unwrap();
        for i in 0..5 {
            ids.push(engine.create_node(&text(&format!("n{i}"))).unwrap());
        }
        engine.delete_node(ids[2]).unwrap();
    }

    let mut engine = StorageEngine::open(dir.path(), "scenarios").unwrap();
    let next = engine.create_node(&text("n5")).unwrap();
    assert!(next > *ids.iter().max().unwrap());

    for window in ids.windows(2) {
        assert!(window[1] > window[0]);
    }
}

#[test]
fn adjacency_consistency_after_mixed_create_and_delete() {
    let dir = TempDir::new().unwrap();
    let mut engine = StorageEngine::open(dir.path(), "scenarios").unwrap();

    let hub = engine.create_node(&PropertyMap::new()).unwrap();
    let leaves: Vec<u32> = (0..4)
        .map(|_| engine.create_node(&PropertyMap::new()).unwrap())
        .collect();
    let edges: Vec<u32> = leaves
        .iter()
        .map(|&leaf| engine.create_edge(hub, &PropertyMap::new(), leaf).unwrap())
        .collect();

    // Delete the second-created edge; the rest must remain reachable from
    // `hub` in LIFO order with the deleted one excised cleanly.
    engine.delete_edge(edges[1]).unwrap();

    let remaining = engine.get_edges_from(hub).unwrap();
    let mut expected: Vec<u32> = edges.iter().copied().filter(|&e| e != edges[1]).collect();
    expected.reverse();
    assert_eq!(remaining, expected);

    for &leaf in &leaves {
        let incoming = engine.get_edges_to(leaf).unwrap();
        if leaves.iter().position(|&l| l == leaf) == Some(1) {
            assert!(incoming.is_empty());
        } else {
            assert_eq!(incoming.len(), 1);
        }
    }
}

#[test]
fn s3_two_hop_neighborhood_via_graph_engine() {
    let dir = TempDir::new().unwrap();
    let storage = StorageEngine::open(dir.path(), "scenarios").unwrap();
    let mut graph = GraphEngine::new(storage);

    let n1 = graph.storage_mut().create_node(&PropertyMap::new()).unwrap();
    let n2 = graph.storage_mut().create_node(&PropertyMap::new()).unwrap();
    let n3 = graph.storage_mut().create_node(&PropertyMap::new()).unwrap();
    graph.storage_mut().create_edge(n1, &PropertyMap::new(), n2).unwrap();
    graph.storage_mut().create_edge(n2, &PropertyMap::new(), n3).unwrap();

    assert_eq!(
        graph.find_neighbours(n1, 2, "scenario-s3", None, None).unwrap(),
        HashSet::from([n2, n3])
    );
    assert_eq!(
        graph.find_neighbours(n1, 1, "scenario-s3-one-hop", None, None).unwrap(),
        HashSet::from([n2])
    );
}

#[test]
fn node_property_scans_filter_by_superset_match() {
    let dir = TempDir::new().unwrap();
    let mut engine = StorageEngine::open(dir.path(), "scenarios").unwrap();

    let mut alice = text("alice");
    alice.insert("age", PropertyValue::Int(30));
    let mut bob = text("bob");
    bob.insert("age", PropertyValue::Int(30));
    engine.create_node(&alice).unwrap();
    engine.create_node(&bob).unwrap();

    let mut query = PropertyMap::new();
    query.insert("age", PropertyValue::Int(30));
    let matches = engine.get_nodes_by_properties(&query).unwrap();
    assert_eq!(matches.len(), 2);
}
