//! The key-value connector contract
//!
//! [`KeyValueStore`] is the seam between callers and a concrete backing
//! store. [`crate::MemoryStore`] is the in-process implementation; a
//! production connector to an external consistent store implements the same
//! trait with identical semantics.
//!
//! Every operation that accepts `transaction: Option<&TransactionId>`
//! applies immediately when it is `None` and is buffered (and returns
//! without touching the live mapping) when it is `Some`.

use crate::error::{KvError, Result};
use crate::lock::StoreLock;
use crate::transaction::TransactionId;
use keystone_core::{json, Value};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Transactional key-value store
pub trait KeyValueStore: Send + Sync {
    /// Get a deep copy of the value stored under `key`.
    ///
    /// Fails with [`KvError::NotFound`] when the key is absent.
    fn get(&self, key: &str) -> Result<Value>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: Value, transaction: Option<&TransactionId>) -> Result<()>;

    /// Remove `key`.
    ///
    /// With `must_exist`, a missing key fails with [`KvError::NotFound`];
    /// otherwise it is a no-op.
    fn delete(
        &self,
        key: &str,
        must_exist: bool,
        transaction: Option<&TransactionId>,
    ) -> Result<()>;

    /// Remove every key starting with `prefix` in one atomic step.
    ///
    /// Returns the number of removed keys, or 0 when buffered.
    fn delete_prefix(&self, prefix: &str, transaction: Option<&TransactionId>) -> Result<usize>;

    /// List keys starting with `prefix`, in ascending order.
    fn prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// List `(key, value)` pairs whose key starts with `prefix`, in ascending
    /// key order. Values are deep copies.
    fn prefix_entries(&self, prefix: &str) -> Result<Vec<(String, Value)>>;

    /// Assert that `key` holds `expected` (`Some`) or is absent (`None`).
    ///
    /// Values are compared through their canonical JSON encoding. Fails with
    /// [`KvError::AssertionFailed`].
    fn assert_value(
        &self,
        key: &str,
        expected: Option<&Value>,
        transaction: Option<&TransactionId>,
    ) -> Result<()>;

    /// Assert that `key` exists. Fails with [`KvError::AssertionFailed`].
    fn assert_exists(&self, key: &str, transaction: Option<&TransactionId>) -> Result<()>;

    /// Allocate a new, empty transaction buffer.
    fn begin_transaction(&self) -> TransactionId;

    /// Execute every buffered operation, in recorded order, atomically.
    ///
    /// If any operation fails, the store is left exactly as it was before the
    /// commit and the error is returned. The buffer is consumed either way.
    fn apply_transaction(&self, transaction: &TransactionId) -> Result<()>;

    /// Discard a buffered transaction without applying it.
    fn delete_transaction(&self, transaction: &TransactionId) -> Result<()>;

    /// No-op round trip, for liveness probing.
    fn nop(&self) -> Result<()>;

    /// Check whether `key` exists.
    fn exists(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(KvError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lazily fetch several keys.
    ///
    /// Nothing is read until the iterator is advanced. With `must_exist`, a
    /// missing key yields `Err(NotFound)` and ends the iteration; values
    /// already yielded are not retracted. Without it, a missing key yields
    /// `Ok(None)`.
    fn get_multi<I>(&self, keys: I, must_exist: bool) -> GetMulti<'_, Self, I::IntoIter>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        GetMulti {
            store: self,
            keys: keys.into_iter(),
            must_exist,
            finished: false,
        }
    }

    /// Store any serializable value under `key`.
    fn set_json<T>(&self, key: &str, value: &T, transaction: Option<&TransactionId>) -> Result<()>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        let value = json::from_plain_json(serde_json::to_value(value)?)?;
        self.set(key, value, transaction)
    }

    /// Read the value under `key` as `T`.
    fn get_json<T>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        let value = self.get(key)?;
        Ok(serde_json::from_value(json::to_plain_json(&value))?)
    }

    /// Take the named lock; see [`StoreLock::acquire`].
    fn lock(
        &self,
        name: &str,
        wait: Option<Duration>,
        expiration: Duration,
    ) -> Result<StoreLock<'_, Self>>
    where
        Self: Sized,
    {
        StoreLock::acquire(self, name, wait, expiration)
    }

    /// Apply a transaction built by `callback`, retrying on failed assertions.
    ///
    /// The callback must build the complete transaction, assertions
    /// included, so that every retry re-evaluates them against fresh state.
    /// On [`KvError::AssertionFailed`] the callback is run again, up to
    /// `max_retries` extra times, calling `retry_wait(attempt)` between
    /// tries. Without `retry_wait`, a random 0–250 ms sleep is used. Any
    /// other error is returned immediately.
    fn apply_callback_transaction<F>(
        &self,
        mut callback: F,
        max_retries: usize,
        retry_wait: Option<&dyn Fn(usize)>,
    ) -> Result<()>
    where
        Self: Sized,
        F: FnMut(&Self) -> Result<TransactionId>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            let transaction = callback(self)?;
            match self.apply_transaction(&transaction) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_assertion_failed() && tries <= max_retries => {
                    debug!(tries, max_retries, error = %e, "Retrying callback transaction");
                    match retry_wait {
                        Some(wait) => wait(tries),
                        None => default_retry_wait(tries),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn default_retry_wait(_attempt: usize) {
    let millis = rand::thread_rng().gen_range(0..=25) * 10;
    std::thread::sleep(Duration::from_millis(millis));
}

/// Lazy, single-pass iterator returned by [`KeyValueStore::get_multi`]
pub struct GetMulti<'a, S, I> {
    store: &'a S,
    keys: I,
    must_exist: bool,
    finished: bool,
}

impl<'a, S, I> Iterator for GetMulti<'a, S, I>
where
    S: KeyValueStore,
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<Option<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let key = self.keys.next()?;
        match self.store.get(key.as_ref()) {
            Ok(value) => Some(Ok(Some(value))),
            Err(KvError::NotFound(_)) if !self.must_exist => Some(Ok(None)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
