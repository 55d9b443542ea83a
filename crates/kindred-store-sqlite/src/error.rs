//! Error type for `kindred-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored node or edge type string no longer names a known variant.
  #[error("unknown {kind} type: {value:?}")]
  UnknownType { kind: &'static str, value: String },

  #[error("property key {0:?} cannot be used in a JSON path")]
  UnaddressableProperty(String),

  #[error("edge {edge_id} references missing node {node_id}")]
  DanglingEdge { edge_id: Uuid, node_id: Uuid },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for kindred_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::DanglingEdge { edge_id, node_id } => Self::DanglingEdge { edge_id, node_id },
      other => Self::graph(other),
    }
  }
}
