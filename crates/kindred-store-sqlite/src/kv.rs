//! [`SqliteKv`]: the SQLite implementation of [`KvBackend`].

use std::path::Path;

use kindred_core::kv::{BatchOp, KvBackend, WriteBatch, prefix_upper_bound};
use rusqlite::OptionalExtension as _;

use crate::{Error, Result, schema::KV_SCHEMA};

/// An ordered key-value store in a single SQLite table.
///
/// Prefix scans become range scans on the primary key. Cloning is cheap; the
/// inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteKv {
  conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for SqliteKv {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteKv").finish_non_exhaustive()
  }
}

impl SqliteKv {
  /// Open (or create) a key-value file at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite kv");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let kv = Self { conn };
    kv.init_schema().await?;
    Ok(kv)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let kv = Self { conn };
    kv.init_schema().await?;
    Ok(kv)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(KV_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `WHERE` condition and its parameters selecting every key under `prefix`.
fn prefix_range(prefix: &str) -> (&'static str, Vec<String>) {
  match prefix_upper_bound(prefix) {
    Some(upper) => ("key >= ?1 AND key < ?2", vec![prefix.to_owned(), upper]),
    None => ("key >= ?1", vec![prefix.to_owned()]),
  }
}

impl KvBackend for SqliteKv {
  type Error = Error;

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let key = key.to_owned();
    let value = self
      .conn
      .call(move |conn| {
        let value: Option<Vec<u8>> = conn
          .query_row(
            "SELECT value FROM entries WHERE key = ?1",
            rusqlite::params![key],
            |r| r.get(0),
          )
          .optional()?;
        Ok(value)
      })
      .await?;
    Ok(value)
  }

  async fn insert_if_absent(&self, key: String, value: Vec<u8>) -> Result<bool> {
    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO entries (key, value) VALUES (?1, ?2)",
          rusqlite::params![key, value],
        )?;
        Ok(changed == 1)
      })
      .await?;
    Ok(inserted)
  }

  async fn write(&self, batch: WriteBatch) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }
    let ops = batch.into_ops();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut put = tx.prepare_cached(
            "INSERT INTO entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          )?;
          let mut delete = tx.prepare_cached("DELETE FROM entries WHERE key = ?1")?;
          for op in ops {
            match op {
              BatchOp::Put { key, value } => put.execute(rusqlite::params![key, value])?,
              BatchOp::Delete { key } => delete.execute(rusqlite::params![key])?,
            };
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let (cond, params) = prefix_range(prefix);
    let prefix = prefix.to_owned();
    let entries = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT key, value FROM entries WHERE {cond} ORDER BY key");
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(entries.into_iter().filter(|(k, _)| k.starts_with(&prefix)).collect())
  }

  async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
    let (cond, params) = prefix_range(prefix);
    let prefix = prefix.to_owned();
    let keys = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT key FROM entries WHERE {cond} ORDER BY key");
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(keys.into_iter().filter(|k| k.starts_with(&prefix)).collect())
  }

  async fn count_prefix(&self, prefix: &str) -> Result<u64> {
    let (cond, params) = prefix_range(prefix);
    let count: i64 = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT COUNT(*) FROM entries WHERE {cond}");
        let count: i64 =
          conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |r| r.get(0))?;
        Ok(count)
      })
      .await?;
    Ok(count as u64)
  }

  async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
    let (cond, params) = prefix_range(prefix);
    let removed = self
      .conn
      .call(move |conn| {
        let sql = format!("DELETE FROM entries WHERE {cond}");
        let removed = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(removed)
      })
      .await?;
    tracing::debug!(removed, "deleted key range");
    Ok(removed as u64)
  }
}
