//! SQLite backends for Kindred.
//!
//! [`SqliteKv`] is an ordered key-value table for the fact ledger (and for the
//! embedded graph backend); [`SqliteGraphStore`] is the relational graph
//! backend. Both wrap [`tokio_rusqlite`] so database access runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod kv;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use kv::SqliteKv;
pub use store::SqliteGraphStore;
