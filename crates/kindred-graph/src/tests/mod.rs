//! Cross-module tests: the backend contract, pedigree traversal, projection
//! sync and an end-to-end walk from ledger facts to family queries.

mod contract;
mod scenario;

use kindred_core::{
  fact::{
    Fact, FactStatus, FactValue, Gender, ParentRole, PersonValue, RelationKind, RelationshipValue,
  },
  privacy::PrivacyClassifier,
};

use crate::{AnyGraphStore, GraphBackend, GraphConfig};

pub(crate) fn classifier() -> PrivacyClassifier { PrivacyClassifier::default().at_year(2024) }

/// Both backends, in memory.
pub(crate) async fn backends() -> Vec<AnyGraphStore> {
  let mut stores = Vec::new();
  for backend in [GraphBackend::Sqlite, GraphBackend::Kv] {
    let config = GraphConfig { backend, path: None };
    stores.push(AnyGraphStore::open(&config).await.expect("open in-memory backend"));
  }
  stores
}

pub(crate) fn person(id: &str, gender: Gender, birth_year: Option<i32>) -> Fact {
  let mut value = PersonValue::new(id);
  value.full_name = Some(format!("Person {id}"));
  value.gender = Some(gender);
  value.birth_year = birth_year;
  Fact::new(format!("{id} is a person of record"), 0.9)
    .with_value(FactValue::Person(value))
    .with_status(FactStatus::Accepted)
}

fn relation(kind: RelationKind, subject: &str, object: &str, role: Option<ParentRole>) -> Fact {
  Fact::new(format!("{subject} {kind:?} {object}"), 0.9)
    .with_value(FactValue::Relationship(RelationshipValue {
      kind,
      subject: subject.into(),
      object: object.into(),
      parent_role: role,
    }))
    .with_status(FactStatus::Accepted)
}

/// `parent` is a parent of `child`; the role is left to the parent's gender.
pub(crate) fn parent(parent: &str, child: &str) -> Fact {
  relation(RelationKind::Parent, parent, child, None)
}

pub(crate) fn parent_as(parent: &str, child: &str, role: ParentRole) -> Fact {
  relation(RelationKind::Parent, parent, child, Some(role))
}

pub(crate) fn spouses(a: &str, b: &str) -> Fact { relation(RelationKind::Spouse, a, b, None) }
