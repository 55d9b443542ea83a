//! [`SqliteGraphStore`]: the relational implementation of [`GraphStore`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use kindred_core::{
  graph::{Direction, Edge, EdgeType, Node, PathResult},
  store::{GraphSource, GraphStore, NodeQuery},
};

use crate::{
  Error, Result,
  encode::{
    EDGE_COLUMNS, EDGE_WIDTH, NODE_COLUMNS, RawEdge, RawNode, encode_uuid, property_path,
  },
  schema::GRAPH_SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A graph store backed by `nodes`/`edges` tables in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteGraphStore {
  conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for SqliteGraphStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteGraphStore").finish_non_exhaustive()
  }
}

/// Placeholder list `?{first}, ?{first + 1}, …` for an `IN (…)` clause over
/// `types`, or `NULL` (which matches nothing) when `types` is empty.
fn type_placeholders(types: &[EdgeType], first: usize) -> String {
  if types.is_empty() {
    return "NULL".to_owned();
  }
  (0..types.len())
    .map(|i| format!("?{}", first + i))
    .collect::<Vec<_>>()
    .join(", ")
}

fn type_params(types: &[EdgeType]) -> Vec<String> {
  types.iter().map(|t| t.as_ref().to_owned()).collect()
}

impl SqliteGraphStore {
  /// Open (or create) a graph store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite graph store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(GRAPH_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn load_node(&self, id: Uuid) -> Result<Option<Node>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawNode> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes n WHERE n.node_id = ?1"),
            rusqlite::params![id_str],
            |row| RawNode::from_row(row, 0),
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawNode::into_node).transpose()
  }

  async fn load_edge(&self, id: Uuid) -> Result<Option<Edge>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawEdge> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {EDGE_COLUMNS} FROM edges e WHERE e.edge_id = ?1"),
            rusqlite::params![id_str],
            RawEdge::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawEdge::into_edge).transpose()
  }

  /// One direction of [`GraphSource::get_neighbors`], in contract order.
  async fn load_neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    outgoing: bool,
  ) -> Result<Vec<(Edge, Node)>> {
    let (near, far) = if outgoing { ("source_id", "target_id") } else { ("target_id", "source_id") };
    let type_filter = edge_types
      .map(|types| format!("AND e.edge_type IN ({})", type_placeholders(types, 2)))
      .unwrap_or_default();
    let mut params = vec![encode_uuid(id)];
    params.extend(edge_types.map(type_params).unwrap_or_default());

    let sql = format!(
      "SELECT {EDGE_COLUMNS}, {NODE_COLUMNS}
       FROM edges e
       JOIN nodes n ON n.node_id = e.{far}
       WHERE e.{near} = ?1 {type_filter}
       ORDER BY e.edge_type, e.{far}, e.edge_id"
    );

    let raws: Vec<(RawEdge, RawNode)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((RawEdge::from_row(row)?, RawNode::from_row(row, EDGE_WIDTH)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(e, n)| -> Result<(Edge, Node)> { Ok((e.into_edge()?, n.into_node()?)) })
      .collect()
  }

  async fn run_query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(node_type) = query.node_type {
      params.push(node_type.as_ref().to_owned());
      conds.push(format!("n.node_type = ?{}", params.len()));
    }
    // `->` yields the property as minified JSON text, so values compare by
    // JSON equality rather than by SQL type affinity.
    for (key, value) in &query.properties {
      params.push(property_path(key)?);
      let path_param = params.len();
      params.push(serde_json::to_string(value)?);
      conds.push(format!("n.properties -> ?{path_param} = json(?{})", params.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
    let sql = format!(
      "SELECT {NODE_COLUMNS} FROM nodes n {where_clause}
       ORDER BY n.node_id
       LIMIT {limit} OFFSET {offset}"
    );

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            RawNode::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNode::into_node).collect()
  }

  /// Shortest undirected path as `(node ids, edge ids)`. A breadth-first
  /// search with a global visited set, run inside one connection call with
  /// one adjacency lookup per direction per expanded node. Hops are tried in
  /// neighbour order, outgoing before incoming.
  async fn shortest_path(
    &self,
    start: Uuid,
    end: Uuid,
    max_depth: usize,
    edge_types: Option<&[EdgeType]>,
  ) -> Result<Option<(Vec<Uuid>, Vec<Uuid>)>> {
    let type_filter = edge_types
      .map(|types| format!("AND edge_type IN ({})", type_placeholders(types, 2)))
      .unwrap_or_default();
    let types = edge_types.map(type_params).unwrap_or_default();
    let outgoing = format!(
      "SELECT edge_id, target_id FROM edges WHERE source_id = ?1 {type_filter}
       ORDER BY edge_type, target_id, edge_id"
    );
    let incoming = format!(
      "SELECT edge_id, source_id FROM edges WHERE target_id = ?1 {type_filter}
       ORDER BY edge_type, source_id, edge_id"
    );
    let (start, end) = (encode_uuid(start), encode_uuid(end));

    let found: Option<(Vec<String>, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let conn: &rusqlite::Connection = conn;
        let exists = |id: &str| -> rusqlite::Result<bool> {
          conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM nodes WHERE node_id = ?1)",
            [id],
            |row| row.get(0),
          )
        };
        if !exists(start.as_str())? || !exists(end.as_str())? {
          return Ok(None);
        }
        if start == end {
          return Ok(Some((vec![start], Vec::new())));
        }

        let mut out_stmt = conn.prepare(&outgoing)?;
        let mut in_stmt = conn.prepare(&incoming)?;
        // Reached node -> (node it was reached from, edge taken).
        let mut parents: HashMap<String, Option<(String, String)>> =
          HashMap::from([(start.clone(), None)]);
        let mut frontier = vec![start.clone()];
        let mut depth = 0;

        'search: while depth < max_depth && !frontier.is_empty() {
          depth += 1;
          let mut next = Vec::new();
          for current in &frontier {
            for stmt in [&mut out_stmt, &mut in_stmt] {
              let params =
                std::iter::once(current.as_str()).chain(types.iter().map(String::as_str));
              let hops = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                  Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
              for (edge_id, neighbor) in hops {
                if parents.contains_key(&neighbor) {
                  continue;
                }
                parents.insert(neighbor.clone(), Some((current.clone(), edge_id)));
                if neighbor == end {
                  break 'search;
                }
                next.push(neighbor);
              }
            }
          }
          frontier = next;
        }
        if !parents.contains_key(&end) {
          return Ok(None);
        }

        let mut nodes = vec![end.clone()];
        let mut edges = Vec::new();
        let mut cursor = end;
        while let Some(Some((prev, edge_id))) = parents.remove(&cursor) {
          nodes.push(prev.clone());
          edges.push(edge_id);
          cursor = prev;
        }
        nodes.reverse();
        edges.reverse();
        Ok(Some((nodes, edges)))
      })
      .await?;

    let Some((nodes, edges)) = found else {
      return Ok(None);
    };
    let parse = |ids: Vec<String>| -> Result<Vec<Uuid>> {
      ids.iter().map(|s| Ok(Uuid::parse_str(s)?)).collect()
    };
    Ok(Some((parse(nodes)?, parse(edges)?)))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_node(&self, node: &Node) -> Result<()> {
    let raw = RawNode::encode(node)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO nodes (node_id, node_type, properties, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(node_id) DO UPDATE SET
             node_type  = excluded.node_type,
             properties = excluded.properties,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
          rusqlite::params![
            raw.node_id,
            raw.node_type,
            raw.properties,
            raw.created_at,
            raw.updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn replace_node(&self, node: &Node) -> Result<bool> {
    let raw = RawNode::encode(node)?;
    let changed = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE nodes
           SET node_type = ?2, properties = ?3, created_at = ?4, updated_at = ?5
           WHERE node_id = ?1",
          rusqlite::params![
            raw.node_id,
            raw.node_type,
            raw.properties,
            raw.created_at,
            raw.updated_at,
          ],
        )?;
        Ok(changed)
      })
      .await?;
    Ok(changed > 0)
  }

  /// Insert or replace `edge`. Returns the id of a missing endpoint instead of
  /// writing when either one is absent.
  async fn upsert_edge(&self, edge: &Edge) -> Result<Option<Uuid>> {
    let raw = RawEdge::encode(edge)?;
    let missing: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for endpoint in [&raw.source_id, &raw.target_id] {
          let exists = tx
            .query_row(
              "SELECT 1 FROM nodes WHERE node_id = ?1",
              rusqlite::params![endpoint],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if !exists {
            return Ok(Some(endpoint.clone()));
          }
        }
        tx.execute(
          "INSERT INTO edges
             (edge_id, edge_type, source_id, target_id, properties, confidence, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(edge_id) DO UPDATE SET
             edge_type  = excluded.edge_type,
             source_id  = excluded.source_id,
             target_id  = excluded.target_id,
             properties = excluded.properties,
             confidence = excluded.confidence,
             created_at = excluded.created_at",
          rusqlite::params![
            raw.edge_id,
            raw.edge_type,
            raw.source_id,
            raw.target_id,
            raw.properties,
            raw.confidence,
            raw.created_at,
          ],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    missing.map(|id| Ok(Uuid::parse_str(&id)?)).transpose()
  }

  async fn delete_row(&self, table: &'static str, column: &'static str, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          &format!("DELETE FROM {table} WHERE {column} = ?1"),
          rusqlite::params![id_str],
        )?;
        Ok(changed)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn count_rows(&self, table: &'static str) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(move |conn| {
        let count: i64 =
          conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(count)
      })
      .await?;
    Ok(count as u64)
  }
}

// ─── GraphSource impl ────────────────────────────────────────────────────────

impl GraphSource for SqliteGraphStore {
  async fn get_node(&self, id: Uuid) -> kindred_core::Result<Option<Node>> {
    Ok(self.load_node(id).await?)
  }

  async fn get_edge(&self, id: Uuid) -> kindred_core::Result<Option<Edge>> {
    Ok(self.load_edge(id).await?)
  }

  async fn get_neighbors(
    &self,
    id: Uuid,
    edge_types: Option<&[EdgeType]>,
    direction: Direction,
  ) -> kindred_core::Result<Vec<(Edge, Node)>> {
    let mut out = Vec::new();
    if matches!(direction, Direction::Out | Direction::Both) {
      out.extend(self.load_neighbors(id, edge_types, true).await?);
    }
    if matches!(direction, Direction::In | Direction::Both) {
      let seen: HashSet<Uuid> = out.iter().map(|(e, _)| e.id).collect();
      out.extend(
        self
          .load_neighbors(id, edge_types, false)
          .await?
          .into_iter()
          .filter(|(e, _)| !seen.contains(&e.id)),
      );
    }
    Ok(out)
  }

  async fn query(&self, query: &NodeQuery) -> kindred_core::Result<Vec<Node>> {
    Ok(self.run_query(query).await?)
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteGraphStore {
  async fn add_node(&self, node: Node) -> kindred_core::Result<Node> {
    self.upsert_node(&node).await?;
    Ok(node)
  }

  async fn update_node(&self, node: Node) -> kindred_core::Result<Option<Node>> {
    Ok(self.replace_node(&node).await?.then_some(node))
  }

  async fn delete_node(&self, id: Uuid) -> kindred_core::Result<bool> {
    // Incident edges go with it through `ON DELETE CASCADE`.
    Ok(self.delete_row("nodes", "node_id", id).await?)
  }

  async fn add_edge(&self, edge: Edge) -> kindred_core::Result<Edge> {
    if let Some(node_id) = self.upsert_edge(&edge).await? {
      return Err(Error::DanglingEdge { edge_id: edge.id, node_id }.into());
    }
    Ok(edge)
  }

  async fn delete_edge(&self, id: Uuid) -> kindred_core::Result<bool> {
    Ok(self.delete_row("edges", "edge_id", id).await?)
  }

  async fn find_path(
    &self,
    start: Uuid,
    end: Uuid,
    max_depth: usize,
    edge_types: Option<&[EdgeType]>,
  ) -> kindred_core::Result<Option<PathResult>> {
    let Some((node_ids, edge_ids)) = self.shortest_path(start, end, max_depth, edge_types).await?
    else {
      return Ok(None);
    };

    let mut nodes = Vec::with_capacity(node_ids.len());
    for id in node_ids {
      match self.load_node(id).await? {
        Some(node) => nodes.push(node),
        // Deleted between the path query and this read.
        None => return Ok(None),
      }
    }
    let mut edges = Vec::with_capacity(edge_ids.len());
    for id in edge_ids {
      match self.load_edge(id).await? {
        Some(edge) => edges.push(edge),
        None => return Ok(None),
      }
    }

    let length = edges.len();
    Ok(Some(PathResult { nodes, edges, length }))
  }

  async fn count_nodes(&self) -> kindred_core::Result<u64> {
    Ok(self.count_rows("nodes").await?)
  }

  async fn count_edges(&self) -> kindred_core::Result<u64> {
    Ok(self.count_rows("edges").await?)
  }

  async fn clear(&self) -> kindred_core::Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute_batch("DELETE FROM edges; DELETE FROM nodes;")?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;
    Ok(())
  }

  async fn close(&self) -> kindred_core::Result<()> {
    self.conn.clone().close().await.map_err(Error::from)?;
    Ok(())
  }
}
