//! From ledger facts in SQLite to family questions on each backend.

use kindred_core::{
  fact::{Citation, Fact, FactStatus, Gender},
  graph::{EdgeType, NodeType},
  store::{GraphSource, GraphStore, NodeQuery},
};
use kindred_ledger::Ledger;
use kindred_store_sqlite::SqliteKv;

use super::{backends, classifier, parent, person, spouses};
use crate::{FamilyUnitOptions, Pedigree, Projection, ProjectionConfig, person_node_id};

#[tokio::test]
async fn three_generations_with_an_in_law() {
  for store in backends().await {
    let kind = store.kind();
    let ledger = Ledger::new(SqliteKv::open_in_memory().await.unwrap());
    for fact in [
      person("alvar", Gender::Male, Some(1890)),
      person("bodil", Gender::Female, Some(1931)),
      person("cecilia", Gender::Female, Some(1950)),
      person("dag", Gender::Male, None),
      parent("alvar", "bodil"),
      parent("bodil", "cecilia"),
      spouses("bodil", "dag"),
      Fact::new("Bodil's telephone was 555-867-5309", 0.6)
        .with_person("bodil")
        .with_source(Citation::new("Address book, 1962").with_url("https://archive.example/ab1962"))
        .with_status(FactStatus::Accepted),
    ] {
      ledger.append(fact).await.unwrap();
    }

    let projection = Projection::new(ledger, store, classifier(), ProjectionConfig::default());
    let meta = projection.sync(true).await.unwrap();
    assert!(meta.is_synced(), "{kind:?}");
    let graph = projection.target();
    let pedigree = Pedigree::new(graph);

    let bodil = pedigree.resolve_person("bodil").await.unwrap().unwrap();
    let family = pedigree
      .get_family_unit(bodil.id, FamilyUnitOptions::default())
      .await
      .unwrap()
      .unwrap();
    let pid_of = |n: &kindred_core::graph::Node| n.str_property("person_id").map(str::to_owned);
    assert_eq!(family.father.as_ref().and_then(pid_of).as_deref(), Some("alvar"));
    assert!(family.mother.is_none());
    assert_eq!(family.spouses.iter().filter_map(pid_of).collect::<Vec<_>>(), vec!["dag"]);
    assert_eq!(family.children.iter().filter_map(pid_of).collect::<Vec<_>>(), vec!["cecilia"]);
    assert!(family.siblings.is_empty());

    let alvar = person_node_id("alvar");
    let dag = person_node_id("dag");
    assert!(pedigree.find_kinship(alvar, dag, 10).await.unwrap().is_none());

    let ancestors = pedigree.get_ancestors(person_node_id("cecilia"), 5, 0.5).await.unwrap();
    let names: Vec<_> = ancestors.members.iter().filter_map(|m| pid_of(&m.node)).collect();
    assert_eq!(names, vec!["bodil", "alvar"]);
    assert_eq!(ancestors.members[0].ahnentafel, Some(3));
    assert_eq!(ancestors.members[1].ahnentafel, Some(6));

    // In-laws are connected through the marriage.
    let path = graph.find_path(alvar, dag, 4, None).await.unwrap().unwrap();
    assert_eq!(path.length, 2);

    // A 1950 birth is living, an 1890 birth is not, no dates is unknown.
    let cecilia = graph.get_node(person_node_id("cecilia")).await.unwrap().unwrap();
    assert_eq!(cecilia.str_property("privacy_status"), Some("living"));
    assert_eq!(cecilia.property("restricted"), Some(&serde_json::Value::Bool(true)));
    let alvar_node = graph.get_node(alvar).await.unwrap().unwrap();
    assert_eq!(alvar_node.str_property("privacy_status"), Some("deceased_presumed"));
    let dag_node = graph.get_node(dag).await.unwrap().unwrap();
    assert_eq!(dag_node.str_property("privacy_status"), Some("unknown"));

    // The phone note is an assertion about a living person and gets flagged.
    let flagged = graph
      .query(&NodeQuery::of_type(NodeType::Assertion).with_property("person_id", "bodil"))
      .await
      .unwrap();
    let note = flagged
      .iter()
      .find(|n| n.str_property("statement").is_some_and(|s| s.contains("telephone")))
      .unwrap();
    assert_eq!(note.properties["pii_violations"], serde_json::json!(["phone"]));
    let cited = graph
      .get_neighbors(note.id, Some(&[EdgeType::CitedIn]), kindred_core::graph::Direction::Out)
      .await
      .unwrap();
    assert_eq!(cited.len(), 1);
    assert_eq!(cited[0].1.node_type, NodeType::Source);

    graph.close().await.unwrap();
  }
}
