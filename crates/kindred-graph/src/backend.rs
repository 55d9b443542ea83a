//! Backend selection: open whichever [`GraphStore`] the configuration names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindred_core::{
  Result,
  graph::{Direction, Edge, EdgeType, Node, PathResult},
  store::{GraphSource, GraphStore, NodeQuery},
};
use kindred_store_sqlite::{SqliteGraphStore, SqliteKv};

use crate::kv_store::KvGraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
  /// Relational tables with recursive path queries.
  #[default]
  Sqlite,
  /// Adjacency keys over an ordered key-value table.
  Kv,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
  pub backend: GraphBackend,
  /// Database file. `None` keeps the graph in memory.
  pub path:    Option<PathBuf>,
}

/// A graph store chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyGraphStore {
  Sqlite(SqliteGraphStore),
  Kv(KvGraphStore<SqliteKv>),
}

impl AnyGraphStore {
  pub async fn open(config: &GraphConfig) -> Result<Self> {
    let store = match (config.backend, &config.path) {
      (GraphBackend::Sqlite, Some(path)) => Self::Sqlite(SqliteGraphStore::open(path).await?),
      (GraphBackend::Sqlite, None) => Self::Sqlite(SqliteGraphStore::open_in_memory().await?),
      (GraphBackend::Kv, Some(path)) => Self::Kv(KvGraphStore::new(SqliteKv::open(path).await?)),
      (GraphBackend::Kv, None) => Self::Kv(KvGraphStore::new(SqliteKv::open_in_memory().await?)),
    };
    tracing::debug!(backend = ?config.backend, path = ?config.path, "opened graph store");
    Ok(store)
  }

  pub fn kind(&self) -> GraphBackend {
    match self {
      Self::Sqlite(_) => GraphBackend::Sqlite,
      Self::Kv(_) => GraphBackend::Kv,
    }
  }
}

macro_rules! dispatch {
  ($self:ident, $store:ident => $call:expr) => {
    match $self {
      AnyGraphStore::Sqlite($store) => $call,
      AnyGraphStore::Kv($store) => $call,
    }
  };
}

impl GraphSource for AnyGraphStore {
  async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
    dispatch!(self, s => s.get_node(id).await)
  }

  async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> {
    dispatch!(self, s => s.get_edge(id).await)
  }

  async fn get_neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    direction: Direction,
  ) -> Result<Vec<(Edge, Node)>> {
    dispatch!(self, s => s.get_neighbors(id, edge_types, direction).await)
  }

  async fn query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
    dispatch!(self, s => s.query(query).await)
  }
}

impl GraphStore for AnyGraphStore {
  async fn add_node(&self, node: Node) -> Result<Node> {
    dispatch!(self, s => s.add_node(node).await)
  }

  async fn update_node(&self, node: Node) -> Result<Option<Node>> {
    dispatch!(self, s => s.update_node(node).await)
  }

  async fn delete_node(&self, id: Uuid) -> Result<bool> {
    dispatch!(self, s => s.delete_node(id).await)
  }

  async fn add_edge(&self, edge: Edge) -> Result<Edge> {
    dispatch!(self, s => s.add_edge(edge).await)
  }

  async fn delete_edge(&self, id: Uuid) -> Result<bool> {
    dispatch!(self, s => s.delete_edge(id).await)
  }

  async fn find_path(
    &self,
    start: Uuid,
    end: Uuid,
    max_depth: usize,
    edge_types: Option<&[EdgeType]>,
  ) -> Result<Option<PathResult>> {
    dispatch!(self, s => s.find_path(start, end, max_depth, edge_types).await)
  }

  async fn count_nodes(&self) -> Result<u64> { dispatch!(self, s => s.count_nodes().await) }

  async fn count_edges(&self) -> Result<u64> { dispatch!(self, s => s.count_edges().await) }

  async fn clear(&self) -> Result<()> { dispatch!(self, s => s.clear().await) }

  async fn close(&self) -> Result<()> { dispatch!(self, s => s.close().await) }
}
