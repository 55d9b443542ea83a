//! Ledger behaviour against the in-memory key-value backend.

use kindred_core::{
  Error,
  fact::{Citation, Fact, FactStatus, FactValue, PersonValue},
  kv::MemoryKv,
};
use uuid::Uuid;

use crate::Ledger;

fn ledger() -> Ledger<MemoryKv> { Ledger::new(MemoryKv::new()) }

fn person_fact(person_id: &str, name: &str) -> Fact {
  let mut value = PersonValue::new(person_id);
  value.full_name = Some(name.into());
  Fact::new(format!("{name} is a person of record"), 0.8)
    .with_value(FactValue::Person(value))
    .with_source(Citation::new("Parish register, Uppsala domkyrkoförsamling"))
}

// ─── Append / get ────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_then_get_returns_identical_fact() {
  let l = ledger();
  let fact = person_fact("p1", "Anna Berg");

  let key = l.append(fact.clone()).await.unwrap();
  assert_eq!(key, format!("{}:1", fact.fact_id));

  let fetched = l.get(fact.fact_id, Some(1)).await.unwrap().unwrap();
  assert_eq!(fetched, fact);
  let latest = l.get(fact.fact_id, None).await.unwrap().unwrap();
  assert_eq!(latest, fact);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let l = ledger();
  assert!(l.get(Uuid::new_v4(), None).await.unwrap().is_none());
  assert!(l.get(Uuid::new_v4(), Some(3)).await.unwrap().is_none());
  assert_eq!(l.get_latest_version(Uuid::new_v4()).await.unwrap(), None);
  assert!(l.get_all_versions(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn first_append_must_be_version_one() {
  let l = ledger();
  let mut fact = person_fact("p1", "Anna Berg");
  fact.version = 2;

  let err = l.append(fact.clone()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidVersion { expected: 1, found: 2, .. }
  ));
  assert_eq!(l.sequence().await.unwrap(), 0);
}

#[tokio::test]
async fn skipped_version_is_rejected() {
  let l = ledger();
  let fact = person_fact("p1", "Anna Berg");
  l.append(fact.clone()).await.unwrap();

  let mut skipped = fact.revised();
  skipped.version = 3;
  let err = l.append(skipped).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidVersion { expected: 2, found: 3, .. }
  ));
}

#[tokio::test]
async fn duplicate_version_is_rejected_and_original_kept() {
  let l = ledger();
  let fact = person_fact("p1", "Anna Berg");
  l.append(fact.clone()).await.unwrap();

  let mut impostor = fact.clone();
  impostor.statement = "rewritten history".into();
  let err = l.append(impostor).await.unwrap_err();
  assert!(matches!(err, Error::InvalidVersion { expected: 2, found: 1, .. }));

  let stored = l.get(fact.fact_id, Some(1)).await.unwrap().unwrap();
  assert_eq!(stored.statement, fact.statement);
}

#[tokio::test]
async fn invalid_confidence_is_rejected_before_write() {
  let l = ledger();
  let fact = Fact::new("overconfident", 1.5);
  assert!(matches!(l.append(fact).await.unwrap_err(), Error::InvalidFact(_)));
  assert_eq!(l.sequence().await.unwrap(), 0);
}

// ─── Versions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn versions_order_numerically_past_nine() {
  let l = ledger();
  let mut fact = person_fact("p1", "Anna Berg");
  l.append(fact.clone()).await.unwrap();
  for _ in 0..11 {
    fact = fact.revised();
    fact.confidence = f64::from(fact.version) / 20.0;
    l.append(fact.clone()).await.unwrap();
  }

  assert_eq!(l.get_latest_version(fact.fact_id).await.unwrap(), Some(12));
  let latest = l.get(fact.fact_id, None).await.unwrap().unwrap();
  assert_eq!(latest.version, 12);

  let versions: Vec<u32> = l
    .get_all_versions(fact.fact_id)
    .await
    .unwrap()
    .into_iter()
    .map(|f| f.version)
    .collect();
  assert_eq!(versions, (1..=12).collect::<Vec<_>>());
}

#[tokio::test]
async fn old_versions_survive_revision() {
  let l = ledger();
  let fact = person_fact("p1", "Anna Berg");
  l.append(fact.clone()).await.unwrap();

  let revised = l
    .revise(fact.fact_id, |f| {
      f.statement = "Anna Berg, born 1842".into();
      f.status = FactStatus::Accepted;
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(revised.version, 2);
  assert_eq!(revised.created_at, fact.created_at);

  let v1 = l.get(fact.fact_id, Some(1)).await.unwrap().unwrap();
  assert_eq!(v1, fact);
  let v2 = l.get(fact.fact_id, Some(2)).await.unwrap().unwrap();
  assert_eq!(v2.status, FactStatus::Accepted);
}

#[tokio::test]
async fn revise_cannot_move_fact_id_or_version() {
  let l = ledger();
  let fact = person_fact("p1", "Anna Berg");
  l.append(fact.clone()).await.unwrap();

  let revised = l
    .revise(fact.fact_id, |f| {
      f.fact_id = Uuid::new_v4();
      f.version = 40;
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(revised.fact_id, fact.fact_id);
  assert_eq!(revised.version, 2);
}

#[tokio::test]
async fn revise_missing_returns_none() {
  let l = ledger();
  assert!(l.revise(Uuid::new_v4(), |_| {}).await.unwrap().is_none());
}

// ─── Iteration ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn iter_all_facts_yields_latest_versions_only() {
  let l = ledger();
  let a = person_fact("p1", "Anna Berg");
  let b = person_fact("p2", "Erik Berg");
  l.append(a.clone()).await.unwrap();
  l.append(b.clone()).await.unwrap();
  l.revise(a.fact_id, |f| f.status = FactStatus::Accepted)
    .await
    .unwrap();

  let facts: Vec<Fact> = l
    .iter_all_facts(None)
    .await
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();
  assert_eq!(facts.len(), 2);

  let a_latest = facts.iter().find(|f| f.fact_id == a.fact_id).unwrap();
  assert_eq!(a_latest.version, 2);
  let b_latest = facts.iter().find(|f| f.fact_id == b.fact_id).unwrap();
  assert_eq!(b_latest.version, 1);
}

#[tokio::test]
async fn status_filter_applies_to_latest_version() {
  let l = ledger();
  let a = person_fact("p1", "Anna Berg").with_status(FactStatus::Accepted);
  let b = person_fact("p2", "Erik Berg");
  l.append(a.clone()).await.unwrap();
  l.append(b.clone()).await.unwrap();
  // `a` was accepted at v1 and rejected at v2; only v2 counts.
  l.revise(a.fact_id, |f| f.status = FactStatus::Rejected)
    .await
    .unwrap();

  let accepted: Vec<Fact> = l
    .iter_all_facts(Some(FactStatus::Accepted))
    .await
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();
  assert!(accepted.is_empty());

  assert_eq!(l.count(Some(FactStatus::Rejected)).await.unwrap(), 1);
  assert_eq!(l.count(Some(FactStatus::Proposed)).await.unwrap(), 1);
  assert_eq!(l.count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn empty_ledger_iterates_nothing() {
  let l = ledger();
  assert_eq!(l.iter_all_facts(None).await.unwrap().count(), 0);
  assert_eq!(l.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn sequence_counts_every_version() {
  let l = ledger();
  let a = person_fact("p1", "Anna Berg");
  l.append(a.clone()).await.unwrap();
  assert_eq!(l.sequence().await.unwrap(), 1);

  l.revise(a.fact_id, |_| {}).await.unwrap();
  l.append(person_fact("p2", "Erik Berg")).await.unwrap();
  assert_eq!(l.sequence().await.unwrap(), 3);
}

#[tokio::test]
async fn facts_for_person_matches_payload_and_subject() {
  let l = ledger();
  l.append(person_fact("p1", "Anna Berg")).await.unwrap();
  l.append(person_fact("p2", "Erik Berg")).await.unwrap();
  l.append(Fact::new("Mentioned in a letter", 0.3).with_person("p1"))
    .await
    .unwrap();

  let facts = l.facts_for_person("p1").await.unwrap();
  assert_eq!(facts.len(), 2);
  assert!(facts.iter().all(|f| f.mentions("p1")));
  assert!(l.facts_for_person("p9").await.unwrap().is_empty());
}
