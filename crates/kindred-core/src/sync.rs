//! Projection bookkeeping types shared between the projection and its
//! callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncEventKind {
  NodeAdded,
  NodeUpdated,
  NodeDeleted,
  EdgeAdded,
  EdgeDeleted,
}

/// One queued change for incremental sync. Events carry ids only; the entity
/// itself is re-read from the source when the event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncEvent {
  pub kind:      SyncEventKind,
  pub entity_id: Uuid,
}

impl SyncEvent {
  pub fn new(kind: SyncEventKind, entity_id: Uuid) -> Self { Self { kind, entity_id } }

  pub fn node_added(id: Uuid) -> Self { Self::new(SyncEventKind::NodeAdded, id) }

  pub fn node_updated(id: Uuid) -> Self { Self::new(SyncEventKind::NodeUpdated, id) }

  pub fn node_deleted(id: Uuid) -> Self { Self::new(SyncEventKind::NodeDeleted, id) }

  pub fn edge_added(id: Uuid) -> Self { Self::new(SyncEventKind::EdgeAdded, id) }

  pub fn edge_deleted(id: Uuid) -> Self { Self::new(SyncEventKind::EdgeDeleted, id) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionStatus {
  Synced,
  Syncing,
  /// The ledger or the event queue is ahead of the projection.
  #[default]
  Stale,
  Error,
}

/// Per-target sync state.
///
/// `projection_version == ledger_version` exactly when `status` is
/// [`ProjectionStatus::Synced`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectionMetadata {
  pub status:             ProjectionStatus,
  /// Number of ledger entries (all versions) last observed.
  pub ledger_version:     u64,
  /// Ledger version the target reflects.
  pub projection_version: u64,
  pub total_nodes:        u64,
  pub total_edges:        u64,
  pub last_sync_at:       Option<DateTime<Utc>>,
  pub last_error:         Option<String>,
}

impl ProjectionMetadata {
  pub fn is_synced(&self) -> bool { self.status == ProjectionStatus::Synced }
}
