//! Tracing decorator for any [`KvStore`].

use async_trait::async_trait;
use hive_core::Result;

use crate::kv::{KvStore, Versioned};

/// A wrapper that adds tracing to a key-value store.
pub struct TracingKvStore<S: KvStore> {
    inner: S,
}

impl<S: KvStore> TracingKvStore<S> {
    /// Create a new tracing store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: KvStore> KvStore for TracingKvStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let result = self.inner.get(key).await;
        if let Ok(ref value) = result {
            tracing::trace!(key, hit = value.is_some(), "get");
        }
        result
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Versioned>>> {
        tracing::trace!(count = keys.len(), "get_many");
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, value: String) -> Result<u64> {
        tracing::debug!(key, bytes = value.len(), "set");
        self.inner.set(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> Result<bool> {
        let result = self.inner.compare_and_swap(key, expected, value).await;
        match result {
            Ok(true) => tracing::debug!(key, ?expected, "compare_and_swap applied"),
            Ok(false) => tracing::debug!(key, ?expected, "compare_and_swap lost race"),
            Err(ref e) => tracing::error!(key, error = %e, "compare_and_swap failed"),
        }
        result
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        tracing::debug!(key, delta, "incr_by");
        self.inner.incr_by(key, delta).await
    }

    async fn counter(&self, key: &str) -> Result<i64> {
        self.inner.counter(key).await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool> {
        tracing::debug!(set, member, "set_add");
        self.inner.set_add(set, member).await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool> {
        tracing::debug!(set, member, "set_remove");
        self.inner.set_remove(set, member).await
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool> {
        self.inner.set_contains(set, member).await
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>> {
        let result = self.inner.set_members(set).await;
        if let Ok(ref members) = result {
            tracing::trace!(set, count = members.len(), "set_members");
        }
        result
    }

    async fn set_len(&self, set: &str) -> Result<usize> {
        self.inner.set_len(set).await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}
