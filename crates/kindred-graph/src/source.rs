//! [`LedgerSource`]: the projection's view of the ledger.

use kindred_core::{Result, kv::KvBackend, privacy::PrivacyClassifier};
use kindred_ledger::Ledger;

use crate::derive::FactGraph;

/// Derives graph snapshots from the latest fact versions in a ledger.
#[derive(Debug, Clone)]
pub struct LedgerSource<K> {
  ledger:           Ledger<K>,
  classifier:       PrivacyClassifier,
  include_proposed: bool,
}

impl<K: KvBackend> LedgerSource<K> {
  pub fn new(ledger: Ledger<K>, classifier: PrivacyClassifier, include_proposed: bool) -> Self {
    Self { ledger, classifier, include_proposed }
  }

  pub fn ledger(&self) -> &Ledger<K> { &self.ledger }

  pub fn classifier(&self) -> &PrivacyClassifier { &self.classifier }

  /// The ledger's entry count, i.e. its version for projection bookkeeping.
  pub async fn version(&self) -> Result<u64> { self.ledger.sequence().await }

  /// Derive the current graph. Entries that fail to decode are skipped.
  pub async fn snapshot(&self) -> Result<FactGraph> {
    let mut facts = Vec::new();
    for fact in self.ledger.iter_all_facts(None).await? {
      match fact {
        Ok(fact) => facts.push(fact),
        Err(error) => tracing::warn!(%error, "skipping undecodable ledger entry"),
      }
    }
    Ok(FactGraph::derive(facts, &self.classifier, self.include_proposed))
  }
}
