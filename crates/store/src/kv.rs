//! Key-value store trait.

use async_trait::async_trait;
use hive_core::Result;

/// A stored value together with its write version.
///
/// Versions start at 1 for the first write of a key and increase by one on
/// every subsequent write. They are the token for [`KvStore::compare_and_swap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    pub version: u64,
}

/// Trait for key-value storage backends.
///
/// Values, counters and sets live in the same flat namespace; a key is only
/// ever used for one kind of entry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Read several values in one round trip, preserving input order.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Versioned>>>;

    /// Unconditionally write a value, returning its new version.
    async fn set(&self, key: &str, value: String) -> Result<u64>;

    /// Write a value only if its current version equals `expected`
    /// (`None` means the key must be absent). Returns whether the write won.
    async fn compare_and_swap(&self, key: &str, expected: Option<u64>, value: String)
    -> Result<bool>;

    /// Atomically add `delta` to a counter, returning the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Read a counter (0 when absent).
    async fn counter(&self, key: &str) -> Result<i64>;

    /// Add a member to a set. Returns true if it was not already present.
    async fn set_add(&self, set: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set. Returns true if it was present.
    async fn set_remove(&self, set: &str, member: &str) -> Result<bool>;

    /// Whether a set contains a member.
    async fn set_contains(&self, set: &str, member: &str) -> Result<bool>;

    /// All members of a set. Enumeration order is backend-defined.
    async fn set_members(&self, set: &str) -> Result<Vec<String>>;

    /// Number of members in a set.
    async fn set_len(&self, set: &str) -> Result<usize>;

    /// Short backend name for diagnostics ("memory", "redis", ...).
    fn backend(&self) -> &'static str;
}
