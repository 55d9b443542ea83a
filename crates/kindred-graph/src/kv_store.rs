//! [`KvGraphStore`]: an adjacency-list graph over any [`KvBackend`].
//!
//! Layout:
//!
//! ```text
//! node:{id}                                     JSON Node
//! edge:{id}                                     JSON Edge
//! adj:out:{node}:{EDGE_TYPE}:{target}:{edge}    empty
//! adj:in:{node}:{EDGE_TYPE}:{source}:{edge}     empty
//! ```
//!
//! Adjacency keys sort by edge type name, then neighbour id, then edge id, so
//! a prefix scan already yields neighbours in contract order. Every logical
//! change is written as one [`WriteBatch`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use kindred_core::{
  Error, Result,
  graph::{Direction, Edge, EdgeType, Node, PathResult},
  kv::{KvBackend, WriteBatch},
  store::{GraphSource, GraphStore, NodeQuery},
};

const NODE_PREFIX: &str = "node:";
const EDGE_PREFIX: &str = "edge:";
const ADJ_PREFIX: &str = "adj:";

fn node_key(id: Uuid) -> String { format!("{NODE_PREFIX}{}", id.hyphenated()) }

fn edge_key(id: Uuid) -> String { format!("{EDGE_PREFIX}{}", id.hyphenated()) }

fn out_key(edge: &Edge) -> String {
  format!(
    "adj:out:{}:{}:{}:{}",
    edge.source_id.hyphenated(),
    edge.edge_type.as_ref(),
    edge.target_id.hyphenated(),
    edge.id.hyphenated(),
  )
}

fn in_key(edge: &Edge) -> String {
  format!(
    "adj:in:{}:{}:{}:{}",
    edge.target_id.hyphenated(),
    edge.edge_type.as_ref(),
    edge.source_id.hyphenated(),
    edge.id.hyphenated(),
  )
}

fn adj_prefix(outgoing: bool, node: Uuid) -> String {
  let side = if outgoing { "out" } else { "in" };
  format!("adj:{side}:{}:", node.hyphenated())
}

/// `(neighbour id, edge id)` from the part of an adjacency key after the
/// node prefix (`{EDGE_TYPE}:{neighbour}:{edge}`).
fn parse_adj_tail(tail: &str) -> Result<(Uuid, Uuid)> {
  let corrupt = || Error::CorruptRecord(format!("malformed adjacency key tail {tail:?}"));
  let mut parts = tail.splitn(3, ':');
  let (Some(_), Some(other), Some(edge)) = (parts.next(), parts.next(), parts.next()) else {
    return Err(corrupt());
  };
  let other = Uuid::parse_str(other).map_err(|_| corrupt())?;
  let edge = Uuid::parse_str(edge).map_err(|_| corrupt())?;
  Ok((other, edge))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> { Ok(serde_json::to_vec(value)?) }

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> { Ok(serde_json::from_slice(bytes)?) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// The embedded graph backend.
#[derive(Debug, Clone)]
pub struct KvGraphStore<K> {
  kv: K,
}

impl<K: KvBackend> KvGraphStore<K> {
  pub fn new(kv: K) -> Self { Self { kv } }

  pub fn backend(&self) -> &K { &self.kv }

  async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let bytes = self.kv.get(key).await.map_err(Error::graph)?;
    bytes.map(|b| decode(&b)).transpose()
  }

  async fn write(&self, batch: WriteBatch) -> Result<()> {
    self.kv.write(batch).await.map_err(Error::graph)
  }

  /// Every incident edge id of `node`, both directions, in key order.
  async fn incident_edge_ids(&self, node: Uuid) -> Result<BTreeSet<Uuid>> {
    let mut ids = BTreeSet::new();
    for outgoing in [true, false] {
      let prefix = adj_prefix(outgoing, node);
      for key in self.kv.scan_keys(&prefix).await.map_err(Error::graph)? {
        let (_, edge_id) = parse_adj_tail(&key[prefix.len()..])?;
        ids.insert(edge_id);
      }
    }
    Ok(ids)
  }

  /// One direction of [`GraphSource::get_neighbors`], in contract order.
  async fn neighbors_one_way(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    outgoing: bool,
  ) -> Result<Vec<(Edge, Node)>> {
    let base = adj_prefix(outgoing, id);

    // A type filter narrows the scan to one key range per type, visited in
    // name order so the concatenation stays sorted.
    let prefixes: Vec<String> = match edge_types {
      None => vec![base.clone()],
      Some(types) => {
        let names: BTreeSet<&str> = types.iter().map(|t| t.as_ref()).collect();
        names.into_iter().map(|name| format!("{base}{name}:")).collect()
      }
    };

    let mut out = Vec::new();
    for prefix in prefixes {
      for key in self.kv.scan_keys(&prefix).await.map_err(Error::graph)? {
        let (other, edge_id) = parse_adj_tail(&key[base.len()..])?;
        let Some(edge) = self.load::<Edge>(&edge_key(edge_id)).await? else {
          tracing::debug!(%edge_id, "adjacency key without edge record, skipping");
          continue;
        };
        let Some(node) = self.load::<Node>(&node_key(other)).await? else {
          tracing::debug!(node_id = %other, "adjacency key without node record, skipping");
          continue;
        };
        out.push((edge, node));
      }
    }
    Ok(out)
  }
}

// ─── GraphSource impl ────────────────────────────────────────────────────────

impl<K: KvBackend> GraphSource for KvGraphStore<K> {
  async fn get_node(&self, id: Uuid) -> Result<Option<Node>> { self.load(&node_key(id)).await }

  async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> { self.load(&edge_key(id)).await }

  async fn get_neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    direction: Direction,
  ) -> Result<Vec<(Edge, Node)>> {
    let mut out = Vec::new();
    if matches!(direction, Direction::Out | Direction::Both) {
      out.extend(self.neighbors_one_way(id, edge_types, true).await?);
    }
    if matches!(direction, Direction::In | Direction::Both) {
      let seen: HashSet<Uuid> = out.iter().map(|(e, _)| e.id).collect();
      out.extend(
        self
          .neighbors_one_way(id, edge_types, false)
          .await?
          .into_iter()
          .filter(|(e, _)| !seen.contains(&e.id)),
      );
    }
    Ok(out)
  }

  async fn query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
    // `node:{uuid}` keys sort by id, which is the contract order.
    let entries = self.kv.scan_prefix(NODE_PREFIX).await.map_err(Error::graph)?;
    let mut nodes = Vec::new();
    let mut skipped = 0;
    for (_, bytes) in entries {
      let node: Node = decode(&bytes)?;
      if !query.matches(&node) {
        continue;
      }
      if skipped < query.offset {
        skipped += 1;
        continue;
      }
      if nodes.len() == query.limit {
        break;
      }
      nodes.push(node);
    }
    Ok(nodes)
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl<K: KvBackend> GraphStore for KvGraphStore<K> {
  async fn add_node(&self, node: Node) -> Result<Node> {
    let mut batch = WriteBatch::new();
    batch.put(node_key(node.id), encode(&node)?);
    self.write(batch).await?;
    Ok(node)
  }

  async fn update_node(&self, node: Node) -> Result<Option<Node>> {
    let key = node_key(node.id);
    if self.kv.get(&key).await.map_err(Error::graph)?.is_none() {
      return Ok(None);
    }
    let mut batch = WriteBatch::new();
    batch.put(key, encode(&node)?);
    self.write(batch).await?;
    Ok(Some(node))
  }

  async fn delete_node(&self, id: Uuid) -> Result<bool> {
    let key = node_key(id);
    if self.kv.get(&key).await.map_err(Error::graph)?.is_none() {
      return Ok(false);
    }

    let mut batch = WriteBatch::new();
    for edge_id in self.incident_edge_ids(id).await? {
      if let Some(edge) = self.load::<Edge>(&edge_key(edge_id)).await? {
        batch.delete(out_key(&edge)).delete(in_key(&edge));
      }
      batch.delete(edge_key(edge_id));
    }
    // Adjacency keys left behind by a missing edge record.
    for outgoing in [true, false] {
      for key in self.kv.scan_keys(&adj_prefix(outgoing, id)).await.map_err(Error::graph)? {
        batch.delete(key);
      }
    }
    batch.delete(key);

    let removed_ops = batch.len();
    self.write(batch).await?;
    tracing::trace!(node_id = %id, removed_ops, "deleted node");
    Ok(true)
  }

  async fn add_edge(&self, edge: Edge) -> Result<Edge> {
    for node_id in [edge.source_id, edge.target_id] {
      if self.kv.get(&node_key(node_id)).await.map_err(Error::graph)?.is_none() {
        return Err(Error::DanglingEdge { edge_id: edge.id, node_id });
      }
    }

    let mut batch = WriteBatch::new();
    // An upsert may move the edge; drop the adjacency keys of the old record.
    if let Some(old) = self.load::<Edge>(&edge_key(edge.id)).await? {
      batch.delete(out_key(&old)).delete(in_key(&old));
    }
    batch
      .put(edge_key(edge.id), encode(&edge)?)
      .put(out_key(&edge), Vec::new())
      .put(in_key(&edge), Vec::new());
    self.write(batch).await?;
    Ok(edge)
  }

  async fn delete_edge(&self, id: Uuid) -> Result<bool> {
    let Some(edge) = self.load::<Edge>(&edge_key(id)).await? else {
      return Ok(false);
    };
    let mut batch = WriteBatch::new();
    batch
      .delete(edge_key(id))
      .delete(out_key(&edge))
      .delete(in_key(&edge));
    self.write(batch).await?;
    Ok(true)
  }

  async fn find_path(
    &self,
    start: Uuid,
    end: Uuid,
    max_depth: usize,
    edge_types: Option<&[EdgeType]>,
  ) -> Result<Option<PathResult>> {
    let Some(start_node) = self.get_node(start).await? else {
      return Ok(None);
    };
    if start == end {
      return Ok(Some(PathResult { nodes: vec![start_node], edges: Vec::new(), length: 0 }));
    }

    // Breadth-first over both edge directions; `parents` doubles as the
    // visited set.
    let mut parents: HashMap<Uuid, Option<(Uuid, Edge, Node)>> = HashMap::new();
    parents.insert(start, None);
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut reached = false;

    'search: while let Some((current, depth)) = queue.pop_front() {
      if depth >= max_depth {
        continue;
      }
      for (edge, node) in self.get_neighbors(current, edge_types, Direction::Both).await? {
        if parents.contains_key(&node.id) {
          continue;
        }
        let next = node.id;
        parents.insert(next, Some((current, edge, node)));
        if next == end {
          reached = true;
          break 'search;
        }
        queue.push_back((next, depth + 1));
      }
    }
    if !reached {
      return Ok(None);
    }

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut cursor = end;
    while let Some(Some((prev, edge, node))) = parents.remove(&cursor) {
      nodes.push(node);
      edges.push(edge);
      cursor = prev;
    }
    nodes.push(start_node);
    nodes.reverse();
    edges.reverse();

    let length = edges.len();
    Ok(Some(PathResult { nodes, edges, length }))
  }

  async fn count_nodes(&self) -> Result<u64> {
    self.kv.count_prefix(NODE_PREFIX).await.map_err(Error::graph)
  }

  async fn count_edges(&self) -> Result<u64> {
    self.kv.count_prefix(EDGE_PREFIX).await.map_err(Error::graph)
  }

  async fn clear(&self) -> Result<()> {
    let mut batch = WriteBatch::new();
    for prefix in [ADJ_PREFIX, EDGE_PREFIX, NODE_PREFIX] {
      for key in self.kv.scan_keys(prefix).await.map_err(Error::graph)? {
        batch.delete(key);
      }
    }
    self.write(batch).await
  }

  async fn close(&self) -> Result<()> { Ok(()) }
}
