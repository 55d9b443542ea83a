//! Error types for `kindred-core`.
//!
//! Lookups never produce errors for missing records; they return `None` or an
//! empty collection. The variants here are reserved for failures a caller has
//! to act on.

use thiserror::Error;
use uuid::Uuid;

use crate::sync::SyncEvent;

/// A boxed backend error, carried as the `source` of the storage variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// The key-value backend beneath the ledger failed; the call was aborted.
  #[error("ledger unavailable: {0}")]
  LedgerUnavailable(#[source] BoxError),

  /// An append did not carry `current_max + 1` as its version.
  #[error("invalid version for fact {fact_id}: expected {expected}, found {found}")]
  InvalidVersion {
    fact_id:  Uuid,
    expected: u32,
    found:    u32,
  },

  #[error("invalid fact: {0}")]
  InvalidFact(String),

  /// Connectivity or query failure inside a graph backend.
  #[error("graph backend error: {0}")]
  GraphBackend(#[source] BoxError),

  #[error("edge {edge_id} references missing node {node_id}")]
  DanglingEdge { edge_id: Uuid, node_id: Uuid },

  /// An incremental sync stopped part-way. `failed_events[0]` is the event
  /// that failed; it and everything after it are still queued.
  #[error("projection sync failed after {applied} applied event(s): {reason}")]
  ProjectionSync {
    failed_events: Vec<SyncEvent>,
    applied:       usize,
    reason:        String,
  },

  #[error("a sync is already running for this projection")]
  SyncInProgress,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A persisted record could not be interpreted (bad key layout, etc.).
  #[error("corrupt record: {0}")]
  CorruptRecord(String),
}

impl Error {
  /// Wrap any backend error as [`Error::GraphBackend`].
  pub fn graph<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::GraphBackend(Box::new(e))
  }

  /// Wrap any backend error as [`Error::LedgerUnavailable`].
  pub fn ledger<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::LedgerUnavailable(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
