//! Encoding and decoding helpers between graph entities and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, property maps are compact JSON, UUIDs are
//! hyphenated lowercase strings (so `ORDER BY` on an id column matches `Uuid`
//! ordering).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use kindred_core::graph::{Edge, EdgeType, Node, NodeType, PropertyMap};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_properties(props: &PropertyMap) -> Result<String> {
  Ok(serde_json::to_string(props)?)
}

pub fn decode_properties(s: &str) -> Result<PropertyMap> { Ok(serde_json::from_str(s)?) }

fn decode_node_type(s: &str) -> Result<NodeType> {
  NodeType::from_str(s).map_err(|_| Error::UnknownType { kind: "node", value: s.to_owned() })
}

fn decode_edge_type(s: &str) -> Result<EdgeType> {
  EdgeType::from_str(s).map_err(|_| Error::UnknownType { kind: "edge", value: s.to_owned() })
}

/// The JSON path `$."key"`, selecting one top-level property. SQLite path
/// labels end at the first `"` and have no escape for it, so such keys are
/// refused.
pub fn property_path(key: &str) -> Result<String> {
  if key.contains('"') {
    return Err(Error::UnaddressableProperty(key.to_owned()));
  }
  Ok(format!("$.\"{key}\""))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of a `nodes` row, ready to bind or freshly read.
#[derive(Debug, Clone)]
pub struct RawNode {
  pub node_id:    String,
  pub node_type:  String,
  pub properties: String,
  pub created_at: String,
  pub updated_at: String,
}

/// `SELECT` list matching [`RawNode::from_row`] at a given column offset.
pub const NODE_COLUMNS: &str = "n.node_id, n.node_type, n.properties, n.created_at, n.updated_at";

impl RawNode {
  pub fn encode(node: &Node) -> Result<Self> {
    Ok(Self {
      node_id:    encode_uuid(node.id),
      node_type:  node.node_type.as_ref().to_owned(),
      properties: encode_properties(&node.properties)?,
      created_at: encode_dt(node.created_at),
      updated_at: encode_dt(node.updated_at),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      node_id:    row.get(offset)?,
      node_type:  row.get(offset + 1)?,
      properties: row.get(offset + 2)?,
      created_at: row.get(offset + 3)?,
      updated_at: row.get(offset + 4)?,
    })
  }

  pub fn into_node(self) -> Result<Node> {
    Ok(Node {
      id:         decode_uuid(&self.node_id)?,
      node_type:  decode_node_type(&self.node_type)?,
      properties: decode_properties(&self.properties)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column values of an `edges` row.
#[derive(Debug, Clone)]
pub struct RawEdge {
  pub edge_id:    String,
  pub edge_type:  String,
  pub source_id:  String,
  pub target_id:  String,
  pub properties: String,
  pub confidence: f64,
  pub created_at: String,
}

/// `SELECT` list matching [`RawEdge::from_row`].
pub const EDGE_COLUMNS: &str =
  "e.edge_id, e.edge_type, e.source_id, e.target_id, e.properties, e.confidence, e.created_at";

/// Number of columns in [`EDGE_COLUMNS`].
pub const EDGE_WIDTH: usize = 7;

impl RawEdge {
  pub fn encode(edge: &Edge) -> Result<Self> {
    Ok(Self {
      edge_id:    encode_uuid(edge.id),
      edge_type:  edge.edge_type.as_ref().to_owned(),
      source_id:  encode_uuid(edge.source_id),
      target_id:  encode_uuid(edge.target_id),
      properties: encode_properties(&edge.properties)?,
      confidence: edge.confidence,
      created_at: encode_dt(edge.created_at),
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      edge_id:    row.get(0)?,
      edge_type:  row.get(1)?,
      source_id:  row.get(2)?,
      target_id:  row.get(3)?,
      properties: row.get(4)?,
      confidence: row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_edge(self) -> Result<Edge> {
    Ok(Edge {
      id:         decode_uuid(&self.edge_id)?,
      edge_type:  decode_edge_type(&self.edge_type)?,
      source_id:  decode_uuid(&self.source_id)?,
      target_id:  decode_uuid(&self.target_id)?,
      properties: decode_properties(&self.properties)?,
      confidence: self.confidence,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn node_survives_column_encoding() {
    let node = Node::new(Uuid::new_v4(), NodeType::Person)
      .with_property("name", "Anna Berg")
      .with_property("birth_year", 1842);
    let raw = RawNode::encode(&node).unwrap();
    assert_eq!(raw.node_type, "person");
    assert_eq!(raw.into_node().unwrap(), node);
  }

  #[test]
  fn property_paths_quote_the_key() {
    assert_eq!(property_path("birth.year").unwrap(), r#"$."birth.year""#);
    assert!(matches!(property_path(r#"say "hi""#), Err(Error::UnaddressableProperty(_))));
  }

  #[test]
  fn unknown_edge_type_is_reported() {
    let edge = Edge::new(Uuid::new_v4(), EdgeType::ParentOf, Uuid::new_v4(), Uuid::new_v4(), 1.0);
    let mut raw = RawEdge::encode(&edge).unwrap();
    assert_eq!(raw.edge_type, "PARENT_OF");
    raw.edge_type = "GODPARENT_OF".into();
    assert!(matches!(raw.into_edge(), Err(Error::UnknownType { kind: "edge", .. })));
  }
}
