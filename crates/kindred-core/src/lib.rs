//! Core types and trait definitions for the Kindred genealogy store.
//!
//! This crate is deliberately free of database dependencies. The ledger,
//! graph backends, projection and traversal crates all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod fact;
pub mod graph;
pub mod kv;
pub mod privacy;
pub mod store;
pub mod sync;

pub use error::{BoxError, Error, Result};
