//! In-memory key-value store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use hive_core::Result;
use tokio::sync::RwLock;

use crate::kv::{KvStore, Versioned};

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Versioned>,
    counters: HashMap<String, i64>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-memory store for development and testing.
///
/// All entries sit behind a single `RwLock`, so every operation is atomic
/// with respect to every other. Sets are ordered, which makes enumeration of
/// ULID-keyed members roughly insertion ordered.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped in an Arc.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let inner = self.inner.read().await;
        Ok(inner.values.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Versioned>>> {
        let inner = self.inner.read().await;
        Ok(keys.iter().map(|k| inner.values.get(k).cloned()).collect())
    }

    async fn set(&self, key: &str, value: String) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let version = inner
            .values
            .get(key)
            .map_or(1, |current| current.version.saturating_add(1));
        inner
            .values
            .insert(key.to_string(), Versioned { value, version });
        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let current = inner.values.get(key).map(|v| v.version);
        if current != expected {
            return Ok(false);
        }

        let version = current.map_or(1, |v| v.saturating_add(1));
        inner
            .values
            .insert(key.to_string(), Versioned { value, version });
        Ok(true)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let counter = inner.counters.entry(key.to_string()).or_insert(0);
        *counter = counter.saturating_add(delta);
        Ok(*counter)
    }

    async fn counter(&self, key: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.counters.get(key).copied().unwrap_or(0))
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .sets
            .get_mut(set)
            .is_some_and(|members| members.remove(member)))
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .sets
            .get(set)
            .is_some_and(|members| members.contains(member)))
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_len(&self, set: &str) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.sets.get(set).map_or(0, BTreeSet::len))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
