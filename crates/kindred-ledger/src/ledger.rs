//! [`Ledger`]: versioned fact storage over any [`KvBackend`].
//!
//! Layout: one entry per fact version, keyed `"{fact_id}:{version}"`, valued
//! with the JSON-encoded [`Fact`]. Nothing is ever overwritten or deleted.

use std::collections::{BTreeMap, btree_map};

use kindred_core::{
  Error, Result,
  fact::{Fact, FactStatus, parse_ledger_key},
  kv::KvBackend,
};
use uuid::Uuid;

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The append-only fact ledger.
///
/// Appends to different fact ids are independent. Appends to the same id are a
/// read-then-write of the next version number and must be serialized by the
/// caller; a writer that loses that race is rejected with
/// [`Error::InvalidVersion`] instead of overwriting the winner.
#[derive(Debug, Clone)]
pub struct Ledger<K> {
  kv: K,
}

impl<K: KvBackend> Ledger<K> {
  /// Wrap `kv`, which must hold nothing but ledger entries: sequence
  /// numbers and fact listings count every key in it.
  pub fn new(kv: K) -> Self { Self { kv } }

  pub fn backend(&self) -> &K { &self.kv }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Append one fact version and return its ledger key.
  ///
  /// The version must be exactly one past the current maximum for the id
  /// (or 1 for a new id).
  pub async fn append(&self, fact: Fact) -> Result<String> {
    fact.validate()?;

    let expected = match self.get_latest_version(fact.fact_id).await? {
      Some(latest) => latest.checked_add(1).ok_or_else(|| {
        Error::InvalidFact(format!("fact {} has exhausted its versions", fact.fact_id))
      })?,
      None => 1,
    };
    if fact.version != expected {
      return Err(Error::InvalidVersion {
        fact_id: fact.fact_id,
        expected,
        found: fact.version,
      });
    }

    let key = fact.ledger_key();
    let bytes = serde_json::to_vec(&fact)?;
    let inserted = self
      .kv
      .insert_if_absent(key.clone(), bytes)
      .await
      .map_err(Error::ledger)?;

    if !inserted {
      // Another writer appended this version between our read and write.
      return Err(Error::InvalidVersion {
        fact_id: fact.fact_id,
        expected: expected + 1,
        found: fact.version,
      });
    }

    tracing::debug!(
      fact_id = %fact.fact_id,
      version = fact.version,
      status = ?fact.status,
      "appended fact",
    );
    Ok(key)
  }

  /// Load the latest version of `fact_id`, let `edit` modify its successor,
  /// and append that successor. Returns `None` if the fact does not exist.
  pub async fn revise<F>(&self, fact_id: Uuid, edit: F) -> Result<Option<Fact>>
  where
    F: FnOnce(&mut Fact),
  {
    let Some(latest) = self.get(fact_id, None).await? else {
      return Ok(None);
    };

    let mut next = latest.revised();
    edit(&mut next);
    // The edit may not move the fact to another id or version.
    next.fact_id = latest.fact_id;
    next.version = latest.version + 1;

    self.append(next.clone()).await?;
    Ok(Some(next))
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// A specific version, or the latest when `version` is `None`.
  pub async fn get(&self, fact_id: Uuid, version: Option<u32>) -> Result<Option<Fact>> {
    let bytes = match version {
      Some(v) => {
        let key = kindred_core::fact::ledger_key(fact_id, v);
        self.kv.get(&key).await.map_err(Error::ledger)?
      }
      None => self
        .versions_of(fact_id)
        .await?
        .pop_last()
        .map(|(_, bytes)| bytes),
    };

    bytes.map(|b| decode(&b)).transpose()
  }

  pub async fn get_latest_version(&self, fact_id: Uuid) -> Result<Option<u32>> {
    let prefix = id_prefix(fact_id);
    let keys = self.kv.scan_keys(&prefix).await.map_err(Error::ledger)?;
    Ok(
      keys
        .iter()
        .filter_map(|k| version_of(k, &prefix))
        .max(),
    )
  }

  /// Every version of `fact_id`, ascending by version number.
  pub async fn get_all_versions(&self, fact_id: Uuid) -> Result<Vec<Fact>> {
    self
      .versions_of(fact_id)
      .await?
      .into_values()
      .map(|bytes| decode(&bytes))
      .collect()
  }

  /// The latest version of every fact, optionally restricted to one status.
  ///
  /// One forward pass over the ledger selects the newest entry per id; each
  /// fact is decoded only as the iterator reaches it.
  pub async fn iter_all_facts(&self, status: Option<FactStatus>) -> Result<FactIter> {
    Ok(FactIter { latest: self.latest_entries().await?.into_iter(), status })
  }

  pub async fn count(&self, status: Option<FactStatus>) -> Result<usize> {
    if status.is_none() {
      return Ok(self.latest_entries().await?.len());
    }
    let mut n = 0;
    for fact in self.iter_all_facts(status).await? {
      fact?;
      n += 1;
    }
    Ok(n)
  }

  /// Total number of entries, counting every version. Grows by exactly one
  /// per successful append.
  pub async fn sequence(&self) -> Result<u64> {
    self.kv.count_prefix("").await.map_err(Error::ledger)
  }

  /// Latest versions of the facts that mention `person_id`.
  pub async fn facts_for_person(&self, person_id: &str) -> Result<Vec<Fact>> {
    let mut facts = Vec::new();
    for fact in self.iter_all_facts(None).await? {
      let fact = fact?;
      if fact.mentions(person_id) {
        facts.push(fact);
      }
    }
    Ok(facts)
  }

  // ── Internals ───────────────────────────────────────────────────────────

  /// Raw entries for one id, keyed by numeric version.
  async fn versions_of(&self, fact_id: Uuid) -> Result<BTreeMap<u32, Vec<u8>>> {
    let prefix = id_prefix(fact_id);
    let entries = self.kv.scan_prefix(&prefix).await.map_err(Error::ledger)?;
    Ok(
      entries
        .into_iter()
        .filter_map(|(k, v)| version_of(&k, &prefix).map(|version| (version, v)))
        .collect(),
    )
  }

  /// `fact_id → (max_version, bytes)` in a single scan.
  async fn latest_entries(&self) -> Result<BTreeMap<Uuid, (u32, Vec<u8>)>> {
    let entries = self.kv.scan_prefix("").await.map_err(Error::ledger)?;
    let mut latest: BTreeMap<Uuid, (u32, Vec<u8>)> = BTreeMap::new();

    for (key, value) in entries {
      let Some((fact_id, version)) = parse_ledger_key(&key) else {
        tracing::warn!(key = %key, "skipping entry with a malformed ledger key");
        continue;
      };
      match latest.entry(fact_id) {
        btree_map::Entry::Vacant(slot) => {
          slot.insert((version, value));
        }
        btree_map::Entry::Occupied(mut slot) => {
          if version > slot.get().0 {
            slot.insert((version, value));
          }
        }
      }
    }

    Ok(latest)
  }
}

// ─── Iterator ────────────────────────────────────────────────────────────────

/// Lazily decoding iterator returned by [`Ledger::iter_all_facts`], ordered
/// by fact id.
pub struct FactIter {
  latest: btree_map::IntoIter<Uuid, (u32, Vec<u8>)>,
  status: Option<FactStatus>,
}

impl Iterator for FactIter {
  type Item = Result<Fact>;

  fn next(&mut self) -> Option<Self::Item> {
    for (_, (_, bytes)) in self.latest.by_ref() {
      match decode(&bytes) {
        Ok(fact) if self.status.is_some_and(|s| s != fact.status) => continue,
        other => return Some(other),
      }
    }
    None
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn id_prefix(fact_id: Uuid) -> String { format!("{}:", fact_id.hyphenated()) }

fn version_of(key: &str, prefix: &str) -> Option<u32> {
  key.strip_prefix(prefix)?.parse().ok()
}

fn decode(bytes: &[u8]) -> Result<Fact> { Ok(serde_json::from_slice(bytes)?) }
