//! In-process key-value store
//!
//! [`MemoryStore`] keeps an ordered map behind a single store-wide
//! reentrant lock.
//! Every public operation holds the lock for its whole read-modify-write
//! sequence, and a transaction commit runs entirely inside one lock
//! acquisition, so no reader can observe a partially applied commit.
//!
//! # Commit Sequence
//!
//! ```text
//! 1. Acquire the store lock
//! 2. Take the transaction's operation buffer (consumed from here on)
//! 3. Snapshot the live mapping
//! 4. Apply each operation in recorded order
//! 5. On the first failure: restore the snapshot, return the error
//! 6. Release the lock
//! ```

use crate::error::{KvError, Result};
use crate::store::KeyValueStore;
use crate::transaction::{Operation, TransactionId};
use keystone_core::{json, Value};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Mutable state guarded by the store lock
#[derive(Debug, Default)]
struct StoreState {
    data: BTreeMap<String, Value>,
    sequences: HashMap<TransactionId, Vec<Operation>>,
}

impl StoreState {
    /// Execute one operation against the live mapping.
    ///
    /// Returns the number of keys written or removed.
    fn execute(&mut self, op: Operation) -> Result<usize> {
        match op {
            Operation::Set { key, value } => {
                self.data.insert(key, value);
                Ok(1)
            }
            Operation::Delete { key, must_exist } => match self.data.remove(&key) {
                Some(_) => Ok(1),
                None if must_exist => Err(KvError::NotFound(key)),
                None => Ok(0),
            },
            Operation::DeletePrefix { prefix } => {
                let doomed = self.keys_with_prefix(&prefix);
                for key in &doomed {
                    self.data.remove(key);
                }
                Ok(doomed.len())
            }
            Operation::AssertValue { key, expected } => {
                let holds = match (self.data.get(&key), &expected) {
                    (None, None) => true,
                    (Some(current), Some(expected)) => {
                        json::encode(current) == json::encode(expected)
                    }
                    _ => false,
                };
                if holds {
                    Ok(0)
                } else {
                    Err(KvError::AssertionFailed(key))
                }
            }
            Operation::AssertExists { key } => {
                if self.data.contains_key(&key) {
                    Ok(0)
                } else {
                    Err(KvError::AssertionFailed(key))
                }
            }
        }
    }

    /// Record an operation in a transaction buffer.
    fn buffer(&mut self, transaction: &TransactionId, op: Operation) -> Result<()> {
        let sequence = self
            .sequences
            .get_mut(transaction)
            .ok_or(KvError::TransactionNotFound(*transaction))?;
        trace!(txn = %transaction, op = op.name(), "Buffering operation");
        sequence.push(op);
        Ok(())
    }

    /// Execute immediately or buffer, depending on `transaction`.
    fn submit(&mut self, op: Operation, transaction: Option<&TransactionId>) -> Result<usize> {
        match transaction {
            Some(txn) => self.buffer(txn, op).map(|_| 0),
            None => self.execute(op),
        }
    }

    fn prefix_range<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.data
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.prefix_range(prefix).map(|(k, _)| k.clone()).collect()
    }
}

/// In-memory transactional key-value store
///
/// # Thread Safety
///
/// `MemoryStore` is `Send + Sync`; share it through `Arc`. All operations
/// are serialized by one lock. Values are cloned on the way in and on the
/// way out, so callers never hold references into stored state.
///
/// # Example
///
/// ```
/// use keystone_kv::{KeyValueStore, MemoryStore};
/// use keystone_core::Value;
///
/// let store = MemoryStore::new("example");
/// store.set("a/1", Value::Int(1), None).unwrap();
///
/// let txn = store.begin_transaction();
/// store.assert_value("a/1", Some(&Value::Int(1)), Some(&txn)).unwrap();
/// store.set("a/2", Value::Int(2), Some(&txn)).unwrap();
/// store.apply_transaction(&txn).unwrap();
///
/// assert_eq!(store.prefix("a/").unwrap(), vec!["a/1", "a/2"]);
/// ```
pub struct MemoryStore {
    cluster: String,
    inner: ReentrantMutex<RefCell<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store for the named cluster
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            inner: ReentrantMutex::new(RefCell::new(StoreState::default())),
        }
    }

    /// Name of the cluster this store stands in for
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.with_state(|state| state.data.len())
    }

    /// Check if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.with_state(|state| state.data.is_empty())
    }

    /// Number of transactions begun but not yet applied or discarded
    pub fn pending_transactions(&self) -> usize {
        self.with_state(|state| state.sequences.len())
    }

    /// Remove all keys and pending transactions
    pub fn clear(&self) {
        self.with_state(|state| {
            state.data.clear();
            state.sequences.clear();
        })
    }

    /// Run `f` with the store lock held.
    ///
    /// The lock is reentrant: a thread already inside the store may take it
    /// again. The state borrow itself is scoped to `f`.
    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Value> {
        self.with_state(|state| {
            state
                .data
                .get(key)
                .cloned()
                .ok_or_else(|| KvError::NotFound(key.to_string()))
        })
    }

    fn set(&self, key: &str, value: Value, transaction: Option<&TransactionId>) -> Result<()> {
        let op = Operation::Set {
            key: key.to_string(),
            value,
        };
        self.with_state(|state| state.submit(op, transaction).map(|_| ()))
    }

    fn delete(
        &self,
        key: &str,
        must_exist: bool,
        transaction: Option<&TransactionId>,
    ) -> Result<()> {
        let op = Operation::Delete {
            key: key.to_string(),
            must_exist,
        };
        self.with_state(|state| state.submit(op, transaction).map(|_| ()))
    }

    fn delete_prefix(&self, prefix: &str, transaction: Option<&TransactionId>) -> Result<usize> {
        let op = Operation::DeletePrefix {
            prefix: prefix.to_string(),
        };
        self.with_state(|state| state.submit(op, transaction))
    }

    fn prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.with_state(|state| state.keys_with_prefix(prefix)))
    }

    fn prefix_entries(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        Ok(self.with_state(|state| {
            state
                .prefix_range(prefix)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }))
    }

    fn assert_value(
        &self,
        key: &str,
        expected: Option<&Value>,
        transaction: Option<&TransactionId>,
    ) -> Result<()> {
        let op = Operation::AssertValue {
            key: key.to_string(),
            expected: expected.cloned(),
        };
        self.with_state(|state| state.submit(op, transaction).map(|_| ()))
    }

    fn assert_exists(&self, key: &str, transaction: Option<&TransactionId>) -> Result<()> {
        let op = Operation::AssertExists {
            key: key.to_string(),
        };
        self.with_state(|state| state.submit(op, transaction).map(|_| ()))
    }

    fn begin_transaction(&self) -> TransactionId {
        let id = TransactionId::new();
        self.with_state(|state| state.sequences.insert(id, Vec::new()));
        debug!(cluster = %self.cluster, txn = %id, "Began transaction");
        id
    }

    fn apply_transaction(&self, transaction: &TransactionId) -> Result<()> {
        self.with_state(|state| -> Result<()> {
            let ops = state
                .sequences
                .remove(transaction)
                .ok_or(KvError::TransactionNotFound(*transaction))?;
            debug!(
                cluster = %self.cluster,
                txn = %transaction,
                ops = ops.len(),
                "Applying transaction"
            );

            let snapshot = state.data.clone();
            for (index, op) in ops.into_iter().enumerate() {
                let name = op.name();
                if let Err(e) = state.execute(op) {
                    warn!(
                        cluster = %self.cluster,
                        txn = %transaction,
                        index,
                        op = name,
                        error = %e,
                        "Transaction aborted, rolling back"
                    );
                    state.data = snapshot;
                    return Err(e);
                }
            }
            Ok(())
        })
    }

    fn delete_transaction(&self, transaction: &TransactionId) -> Result<()> {
        self.with_state(|state| {
            state
                .sequences
                .remove(transaction)
                .map(|_| ())
                .ok_or(KvError::TransactionNotFound(*transaction))
        })
    }

    fn nop(&self) -> Result<()> {
        let _guard = self.inner.lock();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keys, pending) = self.with_state(|state| (state.data.len(), state.sequences.len()));
        f.debug_struct("MemoryStore")
            .field("cluster", &self.cluster)
            .field("keys", &keys)
            .field("pending_transactions", &pending)
            .finish()
    }
}
