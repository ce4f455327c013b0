//! Transactional key-value store for Keystone
//!
//! This crate provides:
//! - [`KeyValueStore`]: the connector contract (get/set/delete, prefix scans,
//!   assertions, buffered transactions with all-or-nothing commit)
//! - [`MemoryStore`]: the in-process implementation
//! - [`StoreRegistry`]: one shared store per cluster name
//! - [`StoreLock`]: named, expiring locks built on store assertions
//!
//! # Transactions
//!
//! A transaction is an ordered buffer of operations. Assertions recorded in
//! the buffer are checked at commit time, which gives optimistic concurrency:
//! build the transaction inside
//! [`KeyValueStore::apply_callback_transaction`] and it is rebuilt and
//! retried whenever another writer invalidated an assertion.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lock;
pub mod memory;
pub mod registry;
pub mod store;
pub mod transaction;

pub use error::{KvError, Result};
pub use lock::{StoreLock, DEFAULT_LOCK_EXPIRATION, LOCK_PREFIX};
pub use memory::MemoryStore;
pub use registry::StoreRegistry;
pub use store::{GetMulti, KeyValueStore};
pub use transaction::{Operation, TransactionId};
