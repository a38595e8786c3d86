//! Storage layer for hive.
//!
//! The marketplace treats storage as a flat key-value namespace with three
//! kinds of entries: versioned JSON values, integer counters, and string
//! sets. [`KvStore`] is the seam between business logic and a concrete
//! backend; [`InMemoryKvStore`] ships for development and tests, and a
//! networked backend only has to implement the same trait.
//!
//! [`Records`] layers typed JSON records on top and provides
//! [`Records::mutate`], an optimistic compare-and-swap loop used for every
//! read-modify-write in the ledger.

pub mod keys;
mod kv;
mod memory;
mod records;
mod traced;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use kv::{KvStore, Versioned};
pub use memory::InMemoryKvStore;
pub use records::{DEFAULT_CAS_RETRIES, Mutation, Records};
pub use traced::TracingKvStore;
