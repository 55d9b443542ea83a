//! The graph store traits and supporting query types.
//!
//! Traits are implemented by the graph backends (`kindred-store-sqlite`,
//! `kindred-graph`). The projection and pedigree traversal depend on these
//! abstractions, never on a concrete backend.
//!
//! Shared result ordering, which every implementation must honour:
//!
//! - [`GraphSource::query`] returns nodes ascending by id.
//! - [`GraphSource::get_neighbors`] returns outgoing matches ordered by
//!   `(edge type name, neighbour id, edge id)`, then incoming matches in the
//!   same order. With [`Direction::Both`] a self-loop is reported once.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Result,
  graph::{Direction, Edge, EdgeType, Node, NodeType, PathResult, PropertyMap},
};

// ─── Query type ──────────────────────────────────────────────────────────────

pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Parameters for [`GraphSource::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
  pub node_type:  Option<NodeType>,
  /// Every entry must equal the node's property of the same name.
  pub properties: PropertyMap,
  pub limit:      usize,
  pub offset:     usize,
}

impl Default for NodeQuery {
  fn default() -> Self {
    Self {
      node_type:  None,
      properties: PropertyMap::new(),
      limit:      DEFAULT_QUERY_LIMIT,
      offset:     0,
    }
  }
}

impl NodeQuery {
  pub fn of_type(node_type: NodeType) -> Self {
    Self { node_type: Some(node_type), ..Self::default() }
  }

  pub fn with_property(
    mut self,
    key: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  pub fn page(mut self, limit: usize, offset: usize) -> Self {
    self.limit = limit;
    self.offset = offset;
    self
  }

  /// Whether `node` passes the type and property filters (pagination aside).
  pub fn matches(&self, node: &Node) -> bool {
    self.node_type.is_none_or(|t| node.node_type == t) && node.matches(&self.properties)
  }
}

/// Whether `edge` passes an optional edge-type filter.
pub fn edge_type_allowed(edge_types: Option<&[EdgeType]>, edge: &Edge) -> bool {
  edge_types.is_none_or(|types| types.contains(&edge.edge_type))
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Read access to a graph: everything traversal and projection sourcing need.
///
/// Lookups of unknown ids return `None` / an empty list, never an error.
pub trait GraphSource: Send + Sync {
  fn get_node(&self, id: Uuid) -> impl Future<Output = Result<Option<Node>>> + Send + '_;

  fn get_edge(&self, id: Uuid) -> impl Future<Output = Result<Option<Edge>>> + Send + '_;

  /// Incident edges of `id` together with the node at their other end.
  fn get_neighbors<'a>(
    &'a self,
    id: Uuid,
    edge_types: Option<&'a [EdgeType]>,
    direction: Direction,
  ) -> impl Future<Output = Result<Vec<(Edge, Node)>>> + Send + 'a;

  /// Nodes matching the type and property filters, paginated.
  fn query<'a>(
    &'a self,
    query: &'a NodeQuery,
  ) -> impl Future<Output = Result<Vec<Node>>> + Send + 'a;
}

/// A writable graph backend.
///
/// Writes are upserts keyed by id. Backend failures surface as
/// [`Error::GraphBackend`](crate::Error::GraphBackend) and are never retried
/// internally.
pub trait GraphStore: GraphSource {
  /// Insert or replace a node.
  fn add_node(&self, node: Node) -> impl Future<Output = Result<Node>> + Send + '_;

  /// Replace an existing node. Returns `None` if no node has that id.
  fn update_node(&self, node: Node) -> impl Future<Output = Result<Option<Node>>> + Send + '_;

  /// Delete a node and every incident edge. Returns `false` if absent.
  fn delete_node(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Insert or replace an edge. Both endpoints must already exist, otherwise
  /// [`Error::DanglingEdge`](crate::Error::DanglingEdge).
  fn add_edge(&self, edge: Edge) -> impl Future<Output = Result<Edge>> + Send + '_;

  fn delete_edge(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send + '_;

  /// A shortest path between `start` and `end` of at most `max_depth` edges,
  /// following edges in either direction.
  fn find_path<'a>(
    &'a self,
    start: Uuid,
    end: Uuid,
    max_depth: usize,
    edge_types: Option<&'a [EdgeType]>,
  ) -> impl Future<Output = Result<Option<PathResult>>> + Send + 'a;

  fn count_nodes(&self) -> impl Future<Output = Result<u64>> + Send + '_;

  fn count_edges(&self) -> impl Future<Output = Result<u64>> + Send + '_;

  /// Remove every node and edge.
  fn clear(&self) -> impl Future<Output = Result<()>> + Send + '_;

  /// Release backend resources. The store must not be used afterwards.
  fn close(&self) -> impl Future<Output = Result<()>> + Send + '_;
}
