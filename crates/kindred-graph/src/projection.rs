//! The CQRS projection: keeps a [`GraphStore`] in step with the ledger.
//!
//! A full rebuild clears the target and copies a fresh snapshot page by page.
//! Incremental sync drains a FIFO of [`SyncEvent`]s; an event leaves the
//! queue only once it has been applied, so a failed sync resumes from the
//! failing event on retry.

use std::{
  collections::{HashSet, VecDeque},
  sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use kindred_core::{
  Error, Result,
  graph::{Direction, NodeType},
  kv::KvBackend,
  privacy::PrivacyClassifier,
  store::{GraphSource, GraphStore, NodeQuery},
  sync::{ProjectionMetadata, ProjectionStatus, SyncEvent, SyncEventKind},
};
use kindred_ledger::Ledger;

use crate::{
  derive::{FactGraph, diff},
  source::LedgerSource,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
  /// Page size for full rebuilds.
  pub batch_size:       usize,
  /// Project `Proposed` facts alongside `Accepted` ones.
  pub include_proposed: bool,
}

impl Default for ProjectionConfig {
  fn default() -> Self { Self { batch_size: 100, include_proposed: true } }
}

// ─── Projection ──────────────────────────────────────────────────────────────

pub struct Projection<K, T> {
  source:   LedgerSource<K>,
  target:   T,
  config:   ProjectionConfig,
  queue:    Mutex<VecDeque<SyncEvent>>,
  metadata: Mutex<ProjectionMetadata>,
  /// The snapshot the queued events were computed against.
  baseline: Mutex<FactGraph>,
}

/// Lock a mutex, recovering the data if a previous holder panicked. The
/// guarded values are plain data that every writer leaves consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resets a `Syncing` status if the sync future is dropped part-way.
struct SyncGuard<'a> {
  metadata: &'a Mutex<ProjectionMetadata>,
}

impl Drop for SyncGuard<'_> {
  fn drop(&mut self) {
    let mut meta = lock(self.metadata);
    if meta.status == ProjectionStatus::Syncing {
      meta.status = ProjectionStatus::Stale;
    }
  }
}

impl<K: KvBackend, T: GraphStore> Projection<K, T> {
  pub fn new(
    ledger: Ledger<K>,
    target: T,
    classifier: PrivacyClassifier,
    config: ProjectionConfig,
  ) -> Self {
    Self {
      source: LedgerSource::new(ledger, classifier, config.include_proposed),
      target,
      config,
      queue: Mutex::new(VecDeque::new()),
      metadata: Mutex::new(ProjectionMetadata::default()),
      baseline: Mutex::new(FactGraph::default()),
    }
  }

  pub fn source(&self) -> &LedgerSource<K> { &self.source }

  pub fn target(&self) -> &T { &self.target }

  pub fn config(&self) -> &ProjectionConfig { &self.config }

  pub fn metadata(&self) -> ProjectionMetadata { lock(&self.metadata).clone() }

  /// Events waiting for the next incremental sync, oldest first.
  pub fn pending_events(&self) -> Vec<SyncEvent> { lock(&self.queue).iter().copied().collect() }

  /// Enqueue a change and mark the projection stale. An event queued while
  /// a sync is running leaves the status at `Syncing`; that sync then ends
  /// `Stale` unless it applied the event.
  pub fn queue_event(&self, event: SyncEvent) {
    // Lock order is metadata, then queue.
    let mut meta = lock(&self.metadata);
    lock(&self.queue).push_back(event);
    if meta.status != ProjectionStatus::Syncing {
      meta.status = ProjectionStatus::Stale;
    }
  }

  /// Diff the ledger against the last captured snapshot and queue the
  /// resulting events. Returns how many were queued.
  pub async fn capture_changes(&self) -> Result<usize> {
    let snapshot = self.source.snapshot().await?;
    let events = {
      let mut baseline = lock(&self.baseline);
      let events = diff(&baseline, &snapshot);
      *baseline = snapshot;
      events
    };
    let count = events.len();
    for event in events {
      self.queue_event(event);
    }
    tracing::debug!(count, "captured ledger changes");
    Ok(count)
  }

  /// Compare the ledger sequence with the projected version; mark the
  /// projection stale if the ledger moved on or events are pending.
  pub async fn check_staleness(&self) -> Result<ProjectionMetadata> {
    let version = self.source.version().await?;
    let pending = !lock(&self.queue).is_empty();
    let mut meta = lock(&self.metadata);
    meta.ledger_version = version;
    if meta.status != ProjectionStatus::Syncing
      && (pending || version != meta.projection_version)
    {
      meta.status = ProjectionStatus::Stale;
    }
    Ok(meta.clone())
  }

  /// Bring the target up to date, either by rebuilding it from scratch or by
  /// applying captured and queued events.
  pub async fn sync(&self, full_rebuild: bool) -> Result<ProjectionMetadata> {
    let _guard = self.begin_sync()?;
    tracing::info!(full_rebuild, "projection sync started");

    let outcome = if full_rebuild {
      self.rebuild().await
    } else {
      self.drain().await
    };

    match outcome {
      Ok(version) => self.finish_sync(version).await,
      Err(error) => {
        let observed = self.source.version().await.ok();
        let mut meta = lock(&self.metadata);
        if let Some(version) = observed {
          meta.ledger_version = version;
        }
        meta.status = ProjectionStatus::Error;
        meta.last_error = Some(error.to_string());
        tracing::warn!(%error, "projection sync failed");
        Err(error)
      }
    }
  }

  fn begin_sync(&self) -> Result<SyncGuard<'_>> {
    let mut meta = lock(&self.metadata);
    if meta.status == ProjectionStatus::Syncing {
      return Err(Error::SyncInProgress);
    }
    meta.status = ProjectionStatus::Syncing;
    Ok(SyncGuard { metadata: &self.metadata })
  }

  async fn finish_sync(&self, version: u64) -> Result<ProjectionMetadata> {
    let total_nodes = self.target.count_nodes().await?;
    let total_edges = self.target.count_edges().await?;
    let mut meta = lock(&self.metadata);
    let pending = lock(&self.queue).len();
    meta.status = if pending == 0 { ProjectionStatus::Synced } else { ProjectionStatus::Stale };
    meta.ledger_version = version;
    meta.projection_version = version;
    meta.total_nodes = total_nodes;
    meta.total_edges = total_edges;
    meta.last_sync_at = Some(Utc::now());
    meta.last_error = None;
    tracing::info!(version, total_nodes, total_edges, pending, "projection synced");
    Ok(meta.clone())
  }

  /// Full rebuild. Returns the ledger version the target now reflects.
  async fn rebuild(&self) -> Result<u64> {
    // Events queued before the snapshot is read are covered by it; later
    // ones stay queued for the next sync.
    let subsumed = lock(&self.queue).len();
    let version = self.source.version().await?;
    let snapshot = self.source.snapshot().await?;

    self.target.clear().await?;
    let (nodes, edges) = copy_graph(&snapshot, &self.target, self.config.batch_size).await?;
    tracing::debug!(nodes, edges, "rebuilt projection");

    {
      let mut queue = lock(&self.queue);
      let subsumed = subsumed.min(queue.len());
      queue.drain(..subsumed);
    }
    *lock(&self.baseline) = snapshot;
    Ok(version)
  }

  /// Incremental sync. Returns the ledger version the target now reflects.
  async fn drain(&self) -> Result<u64> {
    let version = self.source.version().await?;
    self.capture_changes().await?;
    let snapshot = lock(&self.baseline).clone();

    let mut applied = 0;
    loop {
      let Some(event) = lock(&self.queue).front().copied() else { break };
      if let Err(error) = apply_event(&snapshot, &self.target, event).await {
        tracing::warn!(
          kind = %event.kind,
          entity_id = %event.entity_id,
          %error,
          "sync event failed",
        );
        return Err(Error::ProjectionSync {
          failed_events: self.pending_events(),
          applied,
          reason: error.to_string(),
        });
      }
      lock(&self.queue).pop_front();
      applied += 1;
    }

    tracing::debug!(applied, "applied sync events");
    Ok(version)
  }
}

/// Upsert the entity named by `event` from `source` into `target`, or delete
/// it when the event is a deletion or the entity is gone from the source.
async fn apply_event<S, T>(source: &S, target: &T, event: SyncEvent) -> Result<()>
where
  S: GraphSource,
  T: GraphStore,
{
  let id = event.entity_id;
  match event.kind {
    SyncEventKind::NodeAdded | SyncEventKind::NodeUpdated => match source.get_node(id).await? {
      Some(node) => {
        target.add_node(node).await?;
      }
      None => {
        target.delete_node(id).await?;
      }
    },
    SyncEventKind::NodeDeleted => {
      target.delete_node(id).await?;
    }
    SyncEventKind::EdgeAdded => match source.get_edge(id).await? {
      Some(edge) => {
        target.add_edge(edge).await?;
      }
      None => {
        target.delete_edge(id).await?;
      }
    },
    SyncEventKind::EdgeDeleted => {
      target.delete_edge(id).await?;
    }
  }
  Ok(())
}

/// Copy every node and then every edge of `source` into `target`, paging
/// through each node type with offset pagination. Returns the number of nodes
/// and edges written.
async fn copy_graph<S, T>(source: &S, target: &T, batch_size: usize) -> Result<(usize, usize)>
where
  S: GraphSource,
  T: GraphStore,
{
  let batch_size = batch_size.max(1);

  let mut nodes = 0;
  for node_type in NodeType::iter() {
    let mut offset = 0;
    loop {
      let page = source.query(&NodeQuery::of_type(node_type).page(batch_size, offset)).await?;
      let len = page.len();
      for node in page {
        target.add_node(node).await?;
      }
      nodes += len;
      if len < batch_size {
        break;
      }
      offset += batch_size;
    }
  }

  let mut seen = HashSet::new();
  for node_type in NodeType::iter() {
    let mut offset = 0;
    loop {
      let page = source.query(&NodeQuery::of_type(node_type).page(batch_size, offset)).await?;
      for node in &page {
        for (edge, _) in source.get_neighbors(node.id, None, Direction::Out).await? {
          if seen.insert(edge.id) {
            target.add_edge(edge).await?;
          }
        }
      }
      if page.len() < batch_size {
        break;
      }
      offset += batch_size;
    }
  }

  Ok((nodes, seen.len()))
}
