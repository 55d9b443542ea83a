//! The byte-oriented key-value contract beneath the ledger and the embedded
//! graph backend, plus an in-memory implementation.
//!
//! Keys are UTF-8 strings compared bytewise; every scan returns entries in
//! ascending key order. A [`WriteBatch`] is applied atomically: either every
//! operation lands or none does.

use std::{collections::BTreeMap, convert::Infallible, future::Future, sync::Arc};

use tokio::sync::RwLock;

// ─── Batches ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
  Put { key: String, value: Vec<u8> },
  Delete { key: String },
}

/// An ordered group of writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
  ops: Vec<BatchOp>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
    self.ops.push(BatchOp::Put { key: key.into(), value: value.into() });
    self
  }

  pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
    self.ops.push(BatchOp::Delete { key: key.into() });
    self
  }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn ops(&self) -> &[BatchOp] { &self.ops }

  pub fn into_ops(self) -> Vec<BatchOp> { self.ops }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an ordered key-value backend.
pub trait KvBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send + 'a;

  /// Write `value` under `key` only if the key is absent. Returns `false`
  /// (and leaves the existing value untouched) when the key already exists.
  fn insert_if_absent(
    &self,
    key: String,
    value: Vec<u8>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Apply every operation in `batch` atomically.
  fn write(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All entries whose key starts with `prefix`, ascending by key.
  fn scan_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<Vec<(String, Vec<u8>)>, Self::Error>> + Send + 'a;

  /// Like [`scan_prefix`](Self::scan_prefix) but without loading values.
  fn scan_keys<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn count_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Delete every key starting with `prefix`; returns how many were removed.
  fn delete_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;
}

/// The smallest key strictly greater than every key starting with `prefix`,
/// or `None` when no such bound exists (empty prefix, or all `char::MAX`).
/// Backends use it to turn a prefix scan into a primary-key range scan.
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
  let mut chars: Vec<char> = prefix.chars().collect();
  while let Some(last) = chars.pop() {
    let mut next = last as u32 + 1;
    // Skip the surrogate gap.
    if (0xD800..=0xDFFF).contains(&next) {
      next = 0xE000;
    }
    if let Some(c) = char::from_u32(next) {
      chars.push(c);
      return Some(chars.into_iter().collect());
    }
  }
  None
}

// ─── In-memory backend ───────────────────────────────────────────────────────

/// A [`KvBackend`] over a `BTreeMap`. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
  entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKv {
  pub fn new() -> Self { Self::default() }
}

impl KvBackend for MemoryKv {
  type Error = Infallible;

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Infallible> {
    Ok(self.entries.read().await.get(key).cloned())
  }

  async fn insert_if_absent(&self, key: String, value: Vec<u8>) -> Result<bool, Infallible> {
    let mut entries = self.entries.write().await;
    if entries.contains_key(&key) {
      return Ok(false);
    }
    entries.insert(key, value);
    Ok(true)
  }

  async fn write(&self, batch: WriteBatch) -> Result<(), Infallible> {
    let mut entries = self.entries.write().await;
    for op in batch.into_ops() {
      match op {
        BatchOp::Put { key, value } => {
          entries.insert(key, value);
        }
        BatchOp::Delete { key } => {
          entries.remove(&key);
        }
      }
    }
    Ok(())
  }

  async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, Infallible> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .range(prefix.to_owned()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, Infallible> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .range(prefix.to_owned()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect(),
    )
  }

  async fn count_prefix(&self, prefix: &str) -> Result<u64, Infallible> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .range(prefix.to_owned()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .count() as u64,
    )
  }

  async fn delete_prefix(&self, prefix: &str) -> Result<u64, Infallible> {
    let mut entries = self.entries.write().await;
    let doomed: Vec<String> = entries
      .range(prefix.to_owned()..)
      .take_while(|(k, _)| k.starts_with(prefix))
      .map(|(k, _)| k.clone())
      .collect();
    for key in &doomed {
      entries.remove(key);
    }
    Ok(doomed.len() as u64)
  }
}
