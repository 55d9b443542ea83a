//! Ledger → graph derivation.
//!
//! [`FactGraph::derive`] turns the latest fact versions into the read-model
//! graph. Every id is a UUIDv5 of a stable name under [`NAMESPACE`] and every
//! timestamp comes from the contributing facts, so deriving twice from the
//! same facts yields equal graphs and [`diff`] between two derivations names
//! exactly what changed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use kindred_core::{
  Result,
  fact::{
    Citation, EventKind, EventValue, Fact, FactStatus, FactValue, Gender, PersonValue,
    RelationKind, RelationshipValue,
  },
  graph::{Direction, Edge, EdgeType, Node, NodeType},
  privacy::PrivacyClassifier,
  store::{GraphSource, NodeQuery, edge_type_allowed},
  sync::SyncEvent,
};

/// Namespace for every derived node and edge id.
pub const NAMESPACE: Uuid = Uuid::from_u128(0x4b1d_7e5a_0c3f_4a8e_9d21_6f0b_52c8_e713);

fn derived_id(name: &str) -> Uuid { Uuid::new_v5(&NAMESPACE, name.as_bytes()) }

/// Node id of the person with external id `person_id`.
pub fn person_node_id(person_id: &str) -> Uuid { derived_id(&format!("person:{person_id}")) }

pub fn event_node_id(fact_id: Uuid) -> Uuid { derived_id(&format!("event:{fact_id}")) }

/// Edge id for `(type, source, target)`. Repeated assertions of the same
/// relation land on the same edge.
pub fn edge_id(edge_type: EdgeType, source: Uuid, target: Uuid) -> Uuid {
  derived_id(&format!("{}:{source}:{target}", edge_type.as_ref()))
}

/// Case- and whitespace-insensitive place key; `None` for blank names.
fn place_key(name: &str) -> Option<String> {
  let key = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
  (!key.is_empty()).then_some(key)
}

fn source_key(citation: &Citation) -> Option<String> {
  citation
    .source_id
    .as_deref()
    .or(citation.url.as_deref())
    .and_then(place_key)
    .or_else(|| place_key(&citation.title))
}

fn non_blank(value: &Option<String>) -> Option<&String> {
  value.as_ref().filter(|s| !s.trim().is_empty())
}

fn id_list(ids: &BTreeSet<Uuid>) -> Value {
  Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

/// Creation/update window over the facts that contributed to an entity.
#[derive(Debug, Clone, Copy)]
struct Span {
  created: DateTime<Utc>,
  updated: DateTime<Utc>,
}

impl Span {
  fn of(fact: &Fact) -> Self { Self { created: fact.created_at, updated: fact.updated_at } }

  fn widen(&mut self, fact: &Fact) {
    self.created = self.created.min(fact.created_at);
    self.updated = self.updated.max(fact.updated_at);
  }
}

fn widen(span: &mut Option<Span>, fact: &Fact) {
  match span {
    Some(s) => s.widen(fact),
    None => *span = Some(Span::of(fact)),
  }
}

/// Accumulated identity of one person across facts.
#[derive(Debug, Default)]
struct PersonDraft {
  full_name:   Option<String>,
  given_name:  Option<String>,
  surname:     Option<String>,
  gender:      Option<Gender>,
  birth_year:  Option<i32>,
  death_year:  Option<i32>,
  event_birth: Option<i32>,
  event_death: Option<i32>,
  fact_ids:    BTreeSet<Uuid>,
  span:        Option<Span>,
}

impl PersonDraft {
  fn touch(&mut self, fact: &Fact) {
    self.fact_ids.insert(fact.fact_id);
    widen(&mut self.span, fact);
  }

  /// Later non-empty fields win.
  fn merge(&mut self, value: &PersonValue) {
    if let Some(v) = non_blank(&value.full_name) {
      self.full_name = Some(v.clone());
    }
    if let Some(v) = non_blank(&value.given_name) {
      self.given_name = Some(v.clone());
    }
    if let Some(v) = non_blank(&value.surname) {
      self.surname = Some(v.clone());
    }
    if let Some(g) = value.gender.filter(|g| *g != Gender::Unknown) {
      self.gender = Some(g);
    }
    self.birth_year = value.birth_year.or(self.birth_year);
    self.death_year = value.death_year.or(self.death_year);
  }

  fn note_event(&mut self, event: &EventValue) {
    match event.kind {
      EventKind::Birth => self.event_birth = event.year.or(self.event_birth),
      EventKind::Death => self.event_death = event.year.or(self.event_death),
      _ => {}
    }
  }

  fn birth_year(&self) -> Option<i32> { self.birth_year.or(self.event_birth) }

  fn death_year(&self) -> Option<i32> { self.death_year.or(self.event_death) }

  fn display_name(&self) -> Option<String> {
    if let Some(full) = &self.full_name {
      return Some(full.clone());
    }
    let parts: Vec<&str> = [&self.given_name, &self.surname]
      .into_iter()
      .flatten()
      .map(String::as_str)
      .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
  }
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// An immutable, fully materialised graph derived from facts.
///
/// Implements [`GraphSource`] with the shared ordering contract, so it can be
/// traversed directly or used as the source of a projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactGraph {
  nodes:  BTreeMap<Uuid, Node>,
  edges:  BTreeMap<Uuid, Edge>,
  /// `node → [(type, neighbour, edge)]`, sorted.
  out_adj: HashMap<Uuid, Vec<(EdgeType, Uuid, Uuid)>>,
  in_adj:  HashMap<Uuid, Vec<(EdgeType, Uuid, Uuid)>>,
}

impl FactGraph {
  /// Derive the graph of `facts` (latest versions). `Accepted` facts always
  /// project, `Proposed` ones only with `include_proposed`.
  pub fn derive<I>(facts: I, classifier: &PrivacyClassifier, include_proposed: bool) -> Self
  where
    I: IntoIterator<Item = Fact>,
  {
    let mut facts: Vec<Fact> = facts
      .into_iter()
      .filter(|f| match f.status {
        FactStatus::Accepted => true,
        FactStatus::Proposed => include_proposed,
        FactStatus::Rejected | FactStatus::Incomplete => false,
      })
      .collect();
    facts.sort_by(|a, b| (a.created_at, a.fact_id).cmp(&(b.created_at, b.fact_id)));

    let mut builder = Builder::new(classifier);
    builder.collect_persons(&facts);
    builder.materialise_persons();
    for fact in &facts {
      builder.add_fact(fact);
    }
    builder.finish()
  }

  pub fn node(&self, id: Uuid) -> Option<&Node> { self.nodes.get(&id) }

  pub fn edge(&self, id: Uuid) -> Option<&Edge> { self.edges.get(&id) }

  /// All nodes, ascending by id.
  pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }

  /// All edges, ascending by id.
  pub fn edges(&self) -> impl Iterator<Item = &Edge> { self.edges.values() }

  pub fn node_count(&self) -> usize { self.nodes.len() }

  pub fn edge_count(&self) -> usize { self.edges.len() }

  fn neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    direction: Direction,
  ) -> Vec<(Edge, Node)> {
    let sides: &[bool] = match direction {
      Direction::Out => &[true],
      Direction::In => &[false],
      Direction::Both => &[true, false],
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &outgoing in sides {
      let adj = if outgoing { &self.out_adj } else { &self.in_adj };
      for (_, other, edge_id) in adj.get(&id).into_iter().flatten() {
        let (Some(edge), Some(node)) = (self.edges.get(edge_id), self.nodes.get(other)) else {
          continue;
        };
        if edge_type_allowed(edge_types, edge) && seen.insert(*edge_id) {
          out.push((edge.clone(), node.clone()));
        }
      }
    }
    out
  }
}

impl GraphSource for FactGraph {
  async fn get_node(&self, id: Uuid) -> Result<Option<Node>> { Ok(self.nodes.get(&id).cloned()) }

  async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> { Ok(self.edges.get(&id).cloned()) }

  async fn get_neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    direction: Direction,
  ) -> Result<Vec<(Edge, Node)>> {
    Ok(self.neighbors(id, edge_types, direction))
  }

  async fn query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
    Ok(
      self
        .nodes
        .values()
        .filter(|n| query.matches(n))
        .skip(query.offset)
        .take(query.limit)
        .cloned()
        .collect(),
    )
  }
}

/// Events that turn a target holding `prev` into one holding `next`: node
/// upserts, then edge deletions, edge upserts, node deletions.
pub fn diff(prev: &FactGraph, next: &FactGraph) -> Vec<SyncEvent> {
  let mut events = Vec::new();

  for (id, node) in &next.nodes {
    match prev.nodes.get(id) {
      None => events.push(SyncEvent::node_added(*id)),
      Some(old) if old != node => events.push(SyncEvent::node_updated(*id)),
      Some(_) => {}
    }
  }
  for id in prev.edges.keys().filter(|id| !next.edges.contains_key(id)) {
    events.push(SyncEvent::edge_deleted(*id));
  }
  for (id, edge) in &next.edges {
    if prev.edges.get(id) != Some(edge) {
      events.push(SyncEvent::edge_added(*id));
    }
  }
  for id in prev.nodes.keys().filter(|id| !next.nodes.contains_key(id)) {
    events.push(SyncEvent::node_deleted(*id));
  }

  events
}

// ─── Builder ─────────────────────────────────────────────────────────────────

struct Builder<'c> {
  classifier: &'c PrivacyClassifier,
  persons:    BTreeMap<String, PersonDraft>,
  nodes:      BTreeMap<Uuid, Node>,
  edges:      BTreeMap<Uuid, Edge>,
  edge_facts: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl<'c> Builder<'c> {
  fn new(classifier: &'c PrivacyClassifier) -> Self {
    Self {
      classifier,
      persons: BTreeMap::new(),
      nodes: BTreeMap::new(),
      edges: BTreeMap::new(),
      edge_facts: HashMap::new(),
    }
  }

  /// Gather every person mentioned by a typed payload, merging identity
  /// fields in fact order.
  fn collect_persons(&mut self, facts: &[Fact]) {
    for fact in facts {
      let Some(value) = &fact.value else { continue };
      for person_id in value.person_ids() {
        self.persons.entry(person_id.to_owned()).or_default().touch(fact);
      }
      match value {
        FactValue::Person(p) => {
          if let Some(draft) = self.persons.get_mut(&p.person_id) {
            draft.merge(p);
          }
        }
        FactValue::Event(e) => {
          if let Some(draft) = self.persons.get_mut(&e.person_id) {
            draft.note_event(e);
          }
        }
        FactValue::Relationship(_) => {}
      }
    }
  }

  fn materialise_persons(&mut self) {
    for (person_id, draft) in &self.persons {
      let Some(span) = draft.span else { continue };
      let classification = self.classifier.classify(draft.birth_year(), draft.death_year());

      let mut node = Node::new(person_node_id(person_id), NodeType::Person)
        .with_property("person_id", person_id.as_str())
        .with_property("privacy_status", classification.status.as_str())
        .with_property("restricted", classification.restricted)
        .with_property("fact_ids", id_list(&draft.fact_ids));
      if let Some(name) = draft.display_name() {
        node = node.with_property("name", name);
      }
      if let Some(given) = &draft.given_name {
        node = node.with_property("given_name", given.as_str());
      }
      if let Some(surname) = &draft.surname {
        node = node.with_property("surname", surname.as_str());
      }
      if let Some(gender) = draft.gender {
        node = node.with_property("gender", gender.as_str());
      }
      if let Some(year) = draft.birth_year() {
        node = node.with_property("birth_year", year);
      }
      if let Some(year) = draft.death_year() {
        node = node.with_property("death_year", year);
      }
      node.created_at = span.created;
      node.updated_at = span.updated;
      self.nodes.insert(node.id, node);
    }
  }

  fn add_fact(&mut self, fact: &Fact) {
    match &fact.value {
      Some(FactValue::Relationship(r)) => self.add_relationship(fact, r),
      Some(FactValue::Event(e)) => self.add_event(fact, e),
      Some(FactValue::Person(_)) | None => {}
    }
    self.add_assertion(fact);
  }

  fn add_relationship(&mut self, fact: &Fact, rel: &RelationshipValue) {
    if rel.subject == rel.object {
      tracing::warn!(fact_id = %fact.fact_id, person_id = %rel.subject, "ignoring self-relationship");
      return;
    }
    let subject = person_node_id(&rel.subject);
    let object = person_node_id(&rel.object);
    let role = rel.parent_role.map(|r| r.as_str());

    match rel.kind {
      RelationKind::Parent => {
        self.add_edge(EdgeType::ParentOf, subject, object, fact, role);
        self.add_edge(EdgeType::ChildOf, object, subject, fact, role);
      }
      RelationKind::Spouse | RelationKind::Sibling | RelationKind::PossiblySame => {
        let edge_type = match rel.kind {
          RelationKind::Spouse => EdgeType::SpouseOf,
          RelationKind::Sibling => EdgeType::SiblingOf,
          _ => EdgeType::PossiblySameAs,
        };
        // Symmetric relations are stored once, from the smaller person id.
        let (source, target) =
          if rel.subject <= rel.object { (subject, object) } else { (object, subject) };
        self.add_edge(edge_type, source, target, fact, None);
      }
    }
  }

  fn add_event(&mut self, fact: &Fact, event: &EventValue) {
    let person = person_node_id(&event.person_id);
    let event_id = event_node_id(fact.fact_id);

    let mut node = Node::new(event_id, NodeType::Event)
      .with_property("event_type", event.kind.as_str())
      .with_property("person_id", event.person_id.as_str())
      .with_property("fact_id", fact.fact_id.to_string());
    if let Some(year) = event.year {
      node = node.with_property("year", year);
    }
    if let Some(date) = non_blank(&event.date) {
      node = node.with_property("date", date.as_str());
    }
    if let Some(place) = non_blank(&event.place) {
      node = node.with_property("place", place.trim());
    }
    node.created_at = fact.created_at;
    node.updated_at = fact.updated_at;
    self.nodes.insert(event_id, node);
    self.add_edge(EdgeType::ParticipatedIn, person, event_id, fact, None);

    let Some(place_name) = event.place.as_deref() else { return };
    let Some(key) = place_key(place_name) else { return };
    let place_id = derived_id(&format!("place:{key}"));
    self.upsert_shared_node(place_id, NodeType::Place, fact, |node| {
      node.with_property("name", place_name.trim())
    });
    self.add_edge(EdgeType::OccurredAt, event_id, place_id, fact, None);
    match event.kind {
      EventKind::Birth => self.add_edge(EdgeType::BornAt, person, place_id, fact, None),
      EventKind::Death => self.add_edge(EdgeType::DiedAt, person, place_id, fact, None),
      _ => {}
    }
  }

  fn add_assertion(&mut self, fact: &Fact) {
    let subject = fact
      .person_id
      .as_deref()
      .or_else(|| fact.value.as_ref().and_then(|v| v.person_ids().first().copied()));
    let (birth, death) = subject
      .and_then(|id| self.persons.get(id))
      .map(|d| (d.birth_year(), d.death_year()))
      .unwrap_or((None, None));
    let classification = self.classifier.classify_fact(fact, birth, death);

    let violations: Vec<Value> = classification
      .violations
      .iter()
      .map(|v| Value::String(v.kind.as_str().to_owned()))
      .collect();
    let mut node = Node::new(fact.fact_id, NodeType::Assertion)
      .with_property("fact_id", fact.fact_id.to_string())
      .with_property("statement", fact.statement.as_str())
      .with_property("version", fact.version)
      .with_property("status", fact.status.as_str())
      .with_property("confidence", fact.confidence)
      .with_property("privacy_status", classification.status.as_str())
      .with_property("restricted", classification.restricted)
      .with_property("pii_violations", violations);
    if let Some(person_id) = subject {
      node = node.with_property("person_id", person_id);
    }
    node.created_at = fact.created_at;
    node.updated_at = fact.updated_at;
    self.nodes.insert(fact.fact_id, node);

    for citation in &fact.sources {
      let Some(key) = source_key(citation) else { continue };
      let source_id = derived_id(&format!("source:{key}"));
      self.upsert_shared_node(source_id, NodeType::Source, fact, |mut node| {
        node = node.with_property("title", citation.title.as_str());
        for (name, value) in [
          ("source_id", &citation.source_id),
          ("url", &citation.url),
          ("repository", &citation.repository),
        ] {
          if let Some(v) = value {
            node = node.with_property(name, v.as_str());
          }
        }
        node
      });
      let excerpt = citation.excerpt.as_deref();
      self.add_edge(EdgeType::CitedIn, fact.fact_id, source_id, fact, None);
      if let (Some(excerpt), Some(edge)) = (
        excerpt,
        self.edges.get_mut(&edge_id(EdgeType::CitedIn, fact.fact_id, source_id)),
      ) {
        edge.properties.insert("excerpt".into(), excerpt.into());
      }
    }
  }

  /// Create a node shared by several facts (places, sources) on first sight;
  /// later facts only widen its update time.
  fn upsert_shared_node(
    &mut self,
    id: Uuid,
    node_type: NodeType,
    fact: &Fact,
    init: impl FnOnce(Node) -> Node,
  ) {
    match self.nodes.get_mut(&id) {
      Some(node) => node.updated_at = node.updated_at.max(fact.updated_at),
      None => {
        let mut node = init(Node::new(id, node_type));
        node.created_at = fact.created_at;
        node.updated_at = fact.updated_at;
        self.nodes.insert(id, node);
      }
    }
  }

  /// Insert or merge the `(type, source, target)` edge: the highest
  /// confidence wins and the supporting fact ids accumulate.
  fn add_edge(
    &mut self,
    edge_type: EdgeType,
    source: Uuid,
    target: Uuid,
    fact: &Fact,
    parent_role: Option<&str>,
  ) {
    let id = edge_id(edge_type, source, target);
    let edge = self.edges.entry(id).or_insert_with(|| {
      let mut edge = Edge::new(id, edge_type, source, target, fact.confidence);
      edge.created_at = fact.created_at;
      edge
    });
    edge.confidence = edge.confidence.max(fact.confidence);
    edge.created_at = edge.created_at.min(fact.created_at);
    if let Some(role) = parent_role {
      edge.properties.insert("parent_role".into(), role.into());
    }

    let facts = self.edge_facts.entry(id).or_default();
    facts.insert(fact.fact_id);
    edge.properties.insert("fact_ids".into(), id_list(facts));
  }

  fn finish(self) -> FactGraph {
    let mut out_adj: HashMap<Uuid, Vec<(EdgeType, Uuid, Uuid)>> = HashMap::new();
    let mut in_adj: HashMap<Uuid, Vec<(EdgeType, Uuid, Uuid)>> = HashMap::new();
    for edge in self.edges.values() {
      out_adj
        .entry(edge.source_id)
        .or_default()
        .push((edge.edge_type, edge.target_id, edge.id));
      in_adj
        .entry(edge.target_id)
        .or_default()
        .push((edge.edge_type, edge.source_id, edge.id));
    }
    for list in out_adj.values_mut().chain(in_adj.values_mut()) {
      list.sort_by(|a, b| (a.0.as_ref(), a.1, a.2).cmp(&(b.0.as_ref(), b.1, b.2)));
    }

    FactGraph { nodes: self.nodes, edges: self.edges, out_adj, in_adj }
  }
}

#[cfg(test)]
mod tests {
  use kindred_core::fact::ParentRole;

  use super::*;

  fn classifier() -> PrivacyClassifier { PrivacyClassifier::default().at_year(2024) }

  fn person(id: &str, name: &str, gender: Gender, birth: Option<i32>) -> Fact {
    let mut value = PersonValue::new(id);
    value.full_name = Some(name.into());
    value.gender = Some(gender);
    value.birth_year = birth;
    Fact::new(format!("{name} existed"), 0.9)
      .with_value(FactValue::Person(value))
      .with_status(FactStatus::Accepted)
  }

  fn parent(parent: &str, child: &str, role: Option<ParentRole>, confidence: f64) -> Fact {
    Fact::new(format!("{parent} is a parent of {child}"), confidence)
      .with_value(FactValue::Relationship(RelationshipValue {
        kind:        RelationKind::Parent,
        subject:     parent.into(),
        object:      child.into(),
        parent_role: role,
      }))
      .with_status(FactStatus::Accepted)
  }

  #[test]
  fn parent_relation_yields_both_directions() {
    let facts = vec![
      person("a", "Anders", Gender::Male, Some(1850)),
      person("b", "Britta", Gender::Female, Some(1880)),
      parent("a", "b", Some(ParentRole::Father), 0.9),
    ];
    let graph = FactGraph::derive(facts, &classifier(), true);

    let a = person_node_id("a");
    let b = person_node_id("b");
    let down = graph.edge(edge_id(EdgeType::ParentOf, a, b)).unwrap();
    let up = graph.edge(edge_id(EdgeType::ChildOf, b, a)).unwrap();
    assert_eq!(down.str_property("parent_role"), Some("father"));
    assert_eq!(up.str_property("parent_role"), Some("father"));
  }

  #[test]
  fn repeated_assertions_merge_into_one_edge() {
    let facts = vec![parent("a", "b", None, 0.4), parent("a", "b", None, 0.8)];
    let graph = FactGraph::derive(facts, &classifier(), true);

    let edge = graph
      .edge(edge_id(EdgeType::ParentOf, person_node_id("a"), person_node_id("b")))
      .unwrap();
    assert_eq!(edge.confidence, 0.8);
    assert_eq!(edge.properties["fact_ids"].as_array().unwrap().len(), 2);
    // Placeholders for persons only seen in relationships.
    assert!(graph.node(person_node_id("a")).is_some());
    assert_eq!(graph.edges().filter(|e| e.edge_type == EdgeType::ParentOf).count(), 1);
  }

  #[test]
  fn rejected_and_optionally_proposed_facts_are_left_out() {
    let rejected = person("a", "Anders", Gender::Male, None).with_status(FactStatus::Rejected);
    let proposed = person("b", "Britta", Gender::Female, None).with_status(FactStatus::Proposed);

    let with = FactGraph::derive(vec![rejected.clone(), proposed.clone()], &classifier(), true);
    assert!(with.node(person_node_id("a")).is_none());
    assert!(with.node(person_node_id("b")).is_some());

    let without = FactGraph::derive(vec![rejected, proposed], &classifier(), false);
    assert_eq!(without.node_count(), 0);
  }

  #[test]
  fn birth_event_supplies_missing_birth_year_and_place() {
    let event = Fact::new("Britta was born in Uppsala", 0.7)
      .with_value(FactValue::Event(EventValue {
        kind:      EventKind::Birth,
        person_id: "b".into(),
        year:      Some(1880),
        date:      None,
        place:     Some("  Uppsala ".into()),
      }))
      .with_status(FactStatus::Accepted);
    let graph = FactGraph::derive(
      vec![person("b", "Britta", Gender::Female, None), event.clone()],
      &classifier(),
      true,
    );

    let b = graph.node(person_node_id("b")).unwrap();
    assert_eq!(b.property("birth_year"), Some(&Value::from(1880)));
    assert_eq!(b.str_property("privacy_status"), Some("deceased_presumed"));

    let born_at: Vec<&Edge> = graph.edges().filter(|e| e.edge_type == EdgeType::BornAt).collect();
    assert_eq!(born_at.len(), 1);
    let place = graph.node(born_at[0].target_id).unwrap();
    assert_eq!(place.str_property("name"), Some("Uppsala"));
    assert!(graph.node(event_node_id(event.fact_id)).is_some());
  }

  #[test]
  fn unlinked_note_is_restricted_assertion() {
    let note = Fact::new("Call 555-123-4567 about the family bible", 0.5)
      .with_status(FactStatus::Accepted)
      .with_source(Citation::new("Letter from cousin"));
    let graph = FactGraph::derive(vec![note.clone()], &classifier(), true);

    let node = graph.node(note.fact_id).unwrap();
    assert_eq!(node.node_type, NodeType::Assertion);
    assert_eq!(node.property("restricted"), Some(&Value::Bool(true)));
    assert_eq!(node.properties["pii_violations"], serde_json::json!(["phone"]));
    assert_eq!(graph.edges().filter(|e| e.edge_type == EdgeType::CitedIn).count(), 1);
  }

  #[test]
  fn derivation_is_deterministic() {
    let facts = vec![
      person("a", "Anders", Gender::Male, Some(1850)),
      parent("a", "b", None, 0.9),
    ];
    let first = FactGraph::derive(facts.clone(), &classifier(), true);
    let second = FactGraph::derive(facts, &classifier(), true);
    assert_eq!(first, second);
    assert!(diff(&first, &second).is_empty());
  }

  #[test]
  fn diff_orders_upserts_before_deletes() {
    let before = FactGraph::derive(vec![parent("a", "b", None, 0.9)], &classifier(), true);
    let after = FactGraph::derive(vec![parent("a", "c", None, 0.9)], &classifier(), true);

    let events = diff(&before, &after);
    let kinds: Vec<_> = events.iter().map(|e| e.kind.to_string()).collect();
    let first_delete = kinds.iter().position(|k| k.ends_with("deleted")).unwrap();
    assert!(kinds[..first_delete].iter().all(|k| k.starts_with("node_")));
    assert_eq!(kinds.last().map(String::as_str), Some("node_deleted"));
  }
}
