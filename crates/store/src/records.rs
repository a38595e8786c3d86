//! Typed JSON records with optimistic concurrency.

use std::marker::PhantomData;
use std::sync::Arc;

use hive_core::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::kv::KvStore;

/// Default number of attempts a [`Records::mutate`] call makes before
/// giving up with [`Error::Conflict`].
pub const DEFAULT_CAS_RETRIES: usize = 32;

/// What a mutation closure decided to do with the record it was shown.
#[derive(Debug)]
pub enum Mutation<T, R> {
    /// Write the new record and return `R` once the write wins.
    Write(T, R),
    /// Leave the record untouched and return `R`.
    Skip(R),
}

/// A typed view over all records sharing one key prefix.
pub struct Records<T> {
    store: Arc<dyn KvStore>,
    prefix: &'static str,
    max_attempts: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix,
            max_attempts: self.max_attempts,
            _marker: PhantomData,
        }
    }
}

impl<T> Records<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    /// Create a typed view for `prefix`.
    pub fn new(store: Arc<dyn KvStore>, prefix: &'static str) -> Self {
        Self {
            store,
            prefix,
            max_attempts: DEFAULT_CAS_RETRIES,
            _marker: PhantomData,
        }
    }

    /// Override the CAS attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Full store key of a record id.
    #[must_use]
    pub fn key(&self, id: &str) -> String {
        format!("{}{id}", self.prefix)
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Load a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record cannot be decoded.
    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        self.store
            .get(&self.key(id))
            .await?
            .map(|v| decode(&v.value))
            .transpose()
    }

    /// Load several records in one round trip, skipping missing ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record cannot be decoded.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<T>> {
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        self.store
            .get_many(&keys)
            .await?
            .into_iter()
            .flatten()
            .map(|v| decode(&v.value))
            .collect()
    }

    /// Unconditionally overwrite a record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store write fails.
    pub async fn put(&self, id: &str, record: &T) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.store.set(&self.key(id), value).await.map(|_| ())
    }

    /// Write a record only if no record exists under `id` yet.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store write fails.
    pub async fn insert_new(&self, id: &str, record: &T) -> Result<bool> {
        let value = serde_json::to_string(record)?;
        self.store
            .compare_and_swap(&self.key(id), None, value)
            .await
    }

    /// Atomically read-modify-write a record.
    ///
    /// `f` sees the current record (or `None`) and decides whether to write.
    /// If another writer got in between the read and the write, the closure
    /// is invoked again on the fresh value, so it must be free of side
    /// effects.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `f`, store failures, and
    /// [`Error::Conflict`] once the attempt budget is exhausted.
    pub async fn mutate<R, F>(&self, id: &str, mut f: F) -> Result<R>
    where
        F: FnMut(Option<T>) -> Result<Mutation<T, R>> + Send,
        R: Send,
    {
        let key = self.key(id);
        for attempt in 1..=self.max_attempts {
            let current = self.store.get(&key).await?;
            let version = current.as_ref().map(|v| v.version);
            let record = current.map(|v| decode::<T>(&v.value)).transpose()?;

            match f(record)? {
                Mutation::Skip(out) => return Ok(out),
                Mutation::Write(next, out) => {
                    let value = serde_json::to_string(&next)?;
                    if self.store.compare_and_swap(&key, version, value).await? {
                        return Ok(out);
                    }
                    tracing::debug!(key = %key, attempt, "write conflict, retrying");
                }
            }
        }

        tracing::warn!(
            key = %key,
            attempts = self.max_attempts,
            "giving up after repeated write conflicts"
        );
        Err(Error::conflict(format!("too much contention on {key}")))
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(Error::from)
}
