//! Store doubles for tests in other crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use hive_core::{Error, Result};

use crate::kv::{KvStore, Versioned};
use crate::memory::InMemoryKvStore;

/// Store operations a fault can be armed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultyOp {
    CompareAndSwap,
    SetAdd,
    SetRemove,
    IncrBy,
}

impl FaultyOp {
    const fn name(self) -> &'static str {
        match self {
            Self::CompareAndSwap => "compare_and_swap",
            Self::SetAdd => "set_add",
            Self::SetRemove => "set_remove",
            Self::IncrBy => "incr_by",
        }
    }
}

#[derive(Debug)]
struct Fault {
    op: FaultyOp,
    key_prefix: String,
    skip: usize,
    remaining: usize,
}

/// In-memory store that fails chosen operations on demand and enumerates
/// sets newest member first, unlike [`InMemoryKvStore`].
#[derive(Debug, Default)]
pub struct FaultyKvStore {
    inner: InMemoryKvStore,
    faults: Mutex<Vec<Fault>>,
}

impl FaultyKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `skip` calls of `op` on keys starting with `key_prefix`
    /// through, then fail the `times` calls after them.
    pub fn fail(&self, op: FaultyOp, key_prefix: &str, skip: usize, times: usize) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Fault {
                op,
                key_prefix: key_prefix.to_string(),
                skip,
                remaining: times,
            });
    }

    /// Disarm every fault.
    pub fn heal(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn trip(&self, op: FaultyOp, key: &str) -> Result<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(fault) = faults
            .iter_mut()
            .find(|f| f.op == op && f.remaining > 0 && key.starts_with(&f.key_prefix))
        else {
            return Ok(());
        };
        if fault.skip > 0 {
            fault.skip = fault.skip.saturating_sub(1);
            return Ok(());
        }
        fault.remaining = fault.remaining.saturating_sub(1);
        Err(Error::store(op.name(), format!("injected fault on {key}")))
    }
}

#[async_trait]
impl KvStore for FaultyKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Versioned>>> {
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, value: String) -> Result<u64> {
        self.inner.set(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> Result<bool> {
        self.trip(FaultyOp::CompareAndSwap, key)?;
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.trip(FaultyOp::IncrBy, key)?;
        self.inner.incr_by(key, delta).await
    }

    async fn counter(&self, key: &str) -> Result<i64> {
        self.inner.counter(key).await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool> {
        self.trip(FaultyOp::SetAdd, set)?;
        self.inner.set_add(set, member).await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool> {
        self.trip(FaultyOp::SetRemove, set)?;
        self.inner.set_remove(set, member).await
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool> {
        self.inner.set_contains(set, member).await
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>> {
        let mut members = self.inner.set_members(set).await?;
        members.reverse();
        Ok(members)
    }

    async fn set_len(&self, set: &str) -> Result<usize> {
        self.inner.set_len(set).await
    }

    fn backend(&self) -> &'static str {
        "faulty"
    }
}
