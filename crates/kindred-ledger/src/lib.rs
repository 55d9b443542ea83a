//! The append-only, versioned fact ledger.
//!
//! The ledger is the single source of truth. Every other view of the data
//! (the graph projection in particular) can be rebuilt from it.

mod ledger;

pub use ledger::{FactIter, Ledger};

#[cfg(test)]
mod tests;
