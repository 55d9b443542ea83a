//! Graph entities, the read model materialised from the ledger.
//!
//! Nodes and edges reference each other by UUID only. All navigation goes
//! through a store lookup, so cycles (remarriage, adoption loops, pedigree
//! collapse) never create ownership problems.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Free-form node/edge properties. A `BTreeMap` keeps serialisation stable.
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
  Person,
  Event,
  Place,
  Source,
  Assertion,
}

/// Directed relation types. The string form (`PARENT_OF`) is what backends
/// persist and what adjacency keys embed, so it must never contain `:`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
  ParentOf,
  ChildOf,
  SpouseOf,
  SiblingOf,
  BornAt,
  DiedAt,
  CitedIn,
  PossiblySameAs,
  ParticipatedIn,
  OccurredAt,
}

/// Which incident edges [`get_neighbors`](crate::store::GraphSource::get_neighbors)
/// follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Out,
  In,
  Both,
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id:         Uuid,
  pub node_type:  NodeType,
  #[serde(default)]
  pub properties: PropertyMap,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Node {
  pub fn new(id: Uuid, node_type: NodeType) -> Self {
    let now = Utc::now();
    Self {
      id,
      node_type,
      properties: PropertyMap::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn with_property(
    mut self,
    key: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
    self.properties.get(key)
  }

  pub fn str_property(&self, key: &str) -> Option<&str> {
    self.properties.get(key).and_then(|v| v.as_str())
  }

  /// True when every `(key, value)` in `filters` is present and equal.
  pub fn matches(&self, filters: &PropertyMap) -> bool {
    filters
      .iter()
      .all(|(k, v)| self.properties.get(k) == Some(v))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub id:         Uuid,
  pub edge_type:  EdgeType,
  pub source_id:  Uuid,
  pub target_id:  Uuid,
  #[serde(default)]
  pub properties: PropertyMap,
  pub confidence: f64,
  pub created_at: DateTime<Utc>,
}

impl Edge {
  pub fn new(
    id: Uuid,
    edge_type: EdgeType,
    source_id: Uuid,
    target_id: Uuid,
    confidence: f64,
  ) -> Self {
    Self {
      id,
      edge_type,
      source_id,
      target_id,
      properties: PropertyMap::new(),
      confidence,
      created_at: Utc::now(),
    }
  }

  pub fn with_property(
    mut self,
    key: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  pub fn str_property(&self, key: &str) -> Option<&str> {
    self.properties.get(key).and_then(|v| v.as_str())
  }

  /// The endpoint that is not `id`. For a self-loop this is `id` itself.
  pub fn other_end(&self, id: Uuid) -> Uuid {
    if self.source_id == id { self.target_id } else { self.source_id }
  }
}

/// A path returned by `find_path`: `nodes[i]` and `nodes[i + 1]` are joined by
/// `edges[i]`, in whichever direction that edge points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
  pub nodes:  Vec<Node>,
  pub edges:  Vec<Edge>,
  pub length: usize,
}

impl PathResult {
  pub fn node_ids(&self) -> Vec<Uuid> { self.nodes.iter().map(|n| n.id).collect() }
}
