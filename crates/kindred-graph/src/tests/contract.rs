//! Behaviour every graph backend must share. Each test runs against both.

use kindred_core::{
  Error,
  graph::{Direction, Edge, EdgeType, Node, NodeType},
  store::{GraphSource, GraphStore, NodeQuery},
};
use uuid::Uuid;

use super::backends;

fn id(n: u128) -> Uuid { Uuid::from_u128(n) }

fn node(n: u128, node_type: NodeType) -> Node { Node::new(id(n), node_type) }

fn edge(n: u128, edge_type: EdgeType, source: u128, target: u128) -> Edge {
  Edge::new(id(n), edge_type, id(source), id(target), 0.9)
}

fn ids(pairs: &[(Edge, Node)]) -> Vec<(Uuid, Uuid)> {
  pairs.iter().map(|(e, n)| (e.id, n.id)).collect()
}

#[tokio::test]
async fn deleting_a_node_cascades_to_its_edges() {
  for store in backends().await {
    for n in 1..=3 {
      store.add_node(node(n, NodeType::Person)).await.unwrap();
    }
    store.add_edge(edge(101, EdgeType::ParentOf, 1, 2)).await.unwrap();
    store.add_edge(edge(102, EdgeType::SpouseOf, 3, 1)).await.unwrap();
    store.add_edge(edge(103, EdgeType::SiblingOf, 2, 3)).await.unwrap();

    assert!(store.delete_node(id(1)).await.unwrap(), "{:?}", store.kind());
    assert!(!store.delete_node(id(1)).await.unwrap());
    assert!(store.get_edge(id(101)).await.unwrap().is_none());
    assert!(store.get_edge(id(102)).await.unwrap().is_none());
    assert_eq!(store.count_edges().await.unwrap(), 1);

    let around_two = store.get_neighbors(id(2), None, Direction::Both).await.unwrap();
    assert_eq!(ids(&around_two), vec![(id(103), id(3))]);
  }
}

#[tokio::test]
async fn neighbours_follow_the_shared_ordering() {
  for store in backends().await {
    for n in 1..=4 {
      store.add_node(node(n, NodeType::Person)).await.unwrap();
    }
    store.add_edge(edge(201, EdgeType::SpouseOf, 1, 3)).await.unwrap();
    store.add_edge(edge(202, EdgeType::ParentOf, 1, 3)).await.unwrap();
    store.add_edge(edge(203, EdgeType::ParentOf, 1, 2)).await.unwrap();
    store.add_edge(edge(204, EdgeType::ChildOf, 4, 1)).await.unwrap();
    store.add_edge(edge(205, EdgeType::SiblingOf, 1, 1)).await.unwrap();

    let out = store.get_neighbors(id(1), None, Direction::Out).await.unwrap();
    assert_eq!(
      ids(&out),
      vec![(id(203), id(2)), (id(202), id(3)), (id(205), id(1)), (id(201), id(3))],
      "{:?}",
      store.kind()
    );

    let incoming = store.get_neighbors(id(1), None, Direction::In).await.unwrap();
    assert_eq!(ids(&incoming), vec![(id(204), id(4)), (id(205), id(1))]);

    // Outgoing first; the self-loop only once.
    let both = store.get_neighbors(id(1), None, Direction::Both).await.unwrap();
    assert_eq!(
      ids(&both),
      vec![
        (id(203), id(2)),
        (id(202), id(3)),
        (id(205), id(1)),
        (id(201), id(3)),
        (id(204), id(4)),
      ]
    );

    let spouses = store
      .get_neighbors(id(1), Some(&[EdgeType::SpouseOf]), Direction::Both)
      .await
      .unwrap();
    assert_eq!(ids(&spouses), vec![(id(201), id(3))]);

    assert!(store.get_neighbors(id(99), None, Direction::Both).await.unwrap().is_empty());
  }
}

#[tokio::test]
async fn queries_filter_then_paginate_by_id() {
  for store in backends().await {
    for n in [5, 3, 1, 4, 2] {
      let person = node(n, NodeType::Person).with_property("surname", "Lind");
      store.add_node(person).await.unwrap();
    }
    store.add_node(node(6, NodeType::Place)).await.unwrap();
    store
      .add_node(node(7, NodeType::Person).with_property("birth_year", 1900))
      .await
      .unwrap();
    store
      .add_node(node(8, NodeType::Person).with_property("birth_year", "1900"))
      .await
      .unwrap();

    let lind = NodeQuery::of_type(NodeType::Person).with_property("surname", "Lind");
    let page = |limit, offset| lind.clone().page(limit, offset);
    let first: Vec<Uuid> = store.query(&page(2, 0)).await.unwrap().iter().map(|n| n.id).collect();
    assert_eq!(first, vec![id(1), id(2)], "{:?}", store.kind());
    let last: Vec<Uuid> = store.query(&page(2, 4)).await.unwrap().iter().map(|n| n.id).collect();
    assert_eq!(last, vec![id(5)]);
    assert!(store.query(&page(2, 10)).await.unwrap().is_empty());

    let places = store.query(&NodeQuery::of_type(NodeType::Place)).await.unwrap();
    assert_eq!(places.len(), 1);

    // JSON values compare by type as well as content.
    let numeric = NodeQuery::default().with_property("birth_year", 1900);
    let found = store.query(&numeric).await.unwrap();
    assert_eq!(found.iter().map(|n| n.id).collect::<Vec<_>>(), vec![id(7)]);
  }
}

#[tokio::test]
async fn upserts_keep_edges_and_updates_need_an_existing_node() {
  for store in backends().await {
    store.add_node(node(1, NodeType::Person)).await.unwrap();
    store.add_node(node(2, NodeType::Person)).await.unwrap();
    store.add_edge(edge(301, EdgeType::ParentOf, 1, 2)).await.unwrap();

    let renamed = node(1, NodeType::Person).with_property("name", "Karin");
    store.add_node(renamed.clone()).await.unwrap();
    assert!(store.get_edge(id(301)).await.unwrap().is_some(), "{:?}", store.kind());
    assert_eq!(store.get_node(id(1)).await.unwrap(), Some(renamed));

    assert!(store.update_node(node(9, NodeType::Person)).await.unwrap().is_none());
    assert!(store.get_node(id(9)).await.unwrap().is_none());

    let updated = node(2, NodeType::Person).with_property("name", "Nils");
    assert_eq!(store.update_node(updated.clone()).await.unwrap(), Some(updated));
  }
}

#[tokio::test]
async fn edges_need_both_endpoints() {
  for store in backends().await {
    store.add_node(node(1, NodeType::Person)).await.unwrap();
    let err = store.add_edge(edge(401, EdgeType::ParentOf, 1, 2)).await.unwrap_err();
    match err {
      Error::DanglingEdge { edge_id, node_id } => {
        assert_eq!(edge_id, id(401));
        assert_eq!(node_id, id(2));
      }
      other => panic!("{:?}: expected DanglingEdge, got {other:?}", store.kind()),
    }
    assert_eq!(store.count_edges().await.unwrap(), 0);
  }
}

#[tokio::test]
async fn paths_are_shortest_undirected_and_bounded() {
  for store in backends().await {
    for n in 1..=5 {
      store.add_node(node(n, NodeType::Person)).await.unwrap();
    }
    // 1 → 2 ← 3 → 4 by blood, plus a marriage 1–4 and an isolated 5.
    store.add_edge(edge(501, EdgeType::ParentOf, 1, 2)).await.unwrap();
    store.add_edge(edge(502, EdgeType::ChildOf, 2, 3)).await.unwrap();
    store.add_edge(edge(503, EdgeType::ParentOf, 3, 4)).await.unwrap();
    store.add_edge(edge(504, EdgeType::SpouseOf, 4, 1)).await.unwrap();

    let short = store.find_path(id(1), id(4), 5, None).await.unwrap().unwrap();
    assert_eq!(short.length, 1, "{:?}", store.kind());
    assert_eq!(short.node_ids(), vec![id(1), id(4)]);

    let blood = [EdgeType::ParentOf, EdgeType::ChildOf];
    let long = store.find_path(id(1), id(4), 5, Some(&blood)).await.unwrap().unwrap();
    assert_eq!(long.length, 3);
    assert_eq!(long.node_ids(), vec![id(1), id(2), id(3), id(4)]);
    assert_eq!(
      long.edges.iter().map(|e| e.id).collect::<Vec<_>>(),
      vec![id(501), id(502), id(503)]
    );

    assert!(store.find_path(id(1), id(4), 2, Some(&blood)).await.unwrap().is_none());
    assert!(store.find_path(id(1), id(5), 5, None).await.unwrap().is_none());
    assert!(store.find_path(id(1), id(42), 5, None).await.unwrap().is_none());

    let trivial = store.find_path(id(3), id(3), 5, None).await.unwrap().unwrap();
    assert_eq!(trivial.length, 0);
    assert_eq!(trivial.node_ids(), vec![id(3)]);
  }
}

#[tokio::test]
async fn clear_empties_the_store() {
  for store in backends().await {
    for n in 1..=3 {
      store.add_node(node(n, NodeType::Event)).await.unwrap();
    }
    store.add_edge(edge(601, EdgeType::OccurredAt, 1, 2)).await.unwrap();
    assert_eq!(store.count_nodes().await.unwrap(), 3);
    assert_eq!(store.count_edges().await.unwrap(), 1);

    store.clear().await.unwrap();
    assert_eq!(store.count_nodes().await.unwrap(), 0, "{:?}", store.kind());
    assert_eq!(store.count_edges().await.unwrap(), 0);
    assert!(store.query(&NodeQuery::default()).await.unwrap().is_empty());
    store.close().await.unwrap();
  }
}
