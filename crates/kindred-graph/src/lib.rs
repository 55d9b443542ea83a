//! The graph side of Kindred: deriving a graph from ledger facts, the
//! embedded key-value graph backend, the CQRS projection that keeps a backend
//! current, and pedigree traversal.

#![allow(async_fn_in_trait)]

pub mod backend;
pub mod derive;
pub mod kv_store;
pub mod pedigree;
pub mod projection;
pub mod source;

pub use backend::{AnyGraphStore, GraphBackend, GraphConfig};
pub use derive::{FactGraph, diff, edge_id, event_node_id, person_node_id};
pub use kv_store::KvGraphStore;
pub use pedigree::{
  FamilyUnit, FamilyUnitOptions, KinshipResult, Lineage, Pedigree, PedigreeMember,
  PedigreeResult, kinship_label,
};
pub use projection::{Projection, ProjectionConfig};
pub use source::LedgerSource;

#[cfg(test)]
mod tests;
