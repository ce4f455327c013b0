//! Named locks built on store assertions
//!
//! A lock is one key under [`LOCK_PREFIX`] holding a record with the
//! holder's id and an `expires` timestamp (seconds since the Unix epoch).
//!
//! - Acquire: one transaction asserting the key is absent and writing the
//!   record. Losing the race sends the caller back to waiting.
//! - Expiry: a waiter that finds a record past `expires` removes it with a
//!   transaction asserting the record is unchanged, then tries again.
//! - Release: a transaction asserting the record is still ours and deleting
//!   it. If another client already removed an expired record, release only
//!   logs a warning.
//!
//! [`StoreLock`] is a guard; dropping it releases the lock. Nothing renews
//! a lock in the background, so long holders call [`StoreLock::refresh`].

use crate::error::{KvError, Result};
use crate::store::KeyValueStore;
use keystone_core::Value;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key prefix of every lock record
pub const LOCK_PREFIX: &str = "/keystone/locks/";

/// Expiration used when callers have no better estimate
pub const DEFAULT_LOCK_EXPIRATION: Duration = Duration::from_secs(60);

const EXPIRES_FIELD: &str = "expires";
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const SLOW_ACQUIRE: Duration = Duration::from_millis(200);
const LONG_HOLD: Duration = Duration::from_millis(500);

/// Held lock on a name; released on drop
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use keystone_kv::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new("example");
/// {
///     let _guard = store.lock("rebalance", Some(Duration::from_secs(1)), Duration::from_secs(30))?;
///     // exclusive section
/// }
/// assert!(store.prefix("/keystone/locks/").unwrap().is_empty());
/// # Ok::<(), keystone_kv::KvError>(())
/// ```
pub struct StoreLock<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    name: String,
    key: String,
    id: Uuid,
    expiration: Duration,
    record: Value,
    acquired_at: Instant,
    held: bool,
}

impl<'a, S: KeyValueStore + ?Sized> StoreLock<'a, S> {
    /// Take the lock called `name`.
    ///
    /// Waits until the lock is free, giving up with
    /// [`KvError::LockUnavailable`] once `wait` has passed (`None` waits
    /// forever). The record written expires after `expiration`.
    pub fn acquire(
        store: &'a S,
        name: &str,
        wait: Option<Duration>,
        expiration: Duration,
    ) -> Result<Self> {
        let key = lock_key(name);
        let id = Uuid::new_v4();
        let start = Instant::now();

        loop {
            match store.get(&key) {
                Ok(current) => {
                    if is_expired(&current) {
                        info!(lock = name, "Lock expired, removing it");
                        remove_if_unchanged(store, &key, &current)?;
                        continue;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                    let waited = start.elapsed();
                    if wait.map_or(false, |limit| waited > limit) {
                        warn!(lock = name, waited_ms = waited.as_millis() as u64, "Could not acquire lock");
                        return Err(KvError::LockUnavailable(name.to_string()));
                    }
                    continue;
                }
                Err(KvError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }

            let record = lock_record(&id, expiration);
            let txn = store.begin_transaction();
            store.assert_value(&key, None, Some(&txn))?;
            store.set(&key, record.clone(), Some(&txn))?;
            match store.apply_transaction(&txn) {
                Ok(()) => {
                    let waited = start.elapsed();
                    if waited > SLOW_ACQUIRE {
                        warn!(lock = name, waited_ms = waited.as_millis() as u64, "Slow lock acquisition");
                    }
                    debug!(lock = name, id = %id, "Acquired lock");
                    return Ok(Self {
                        store,
                        name: name.to_string(),
                        key,
                        id,
                        expiration,
                        record,
                        acquired_at: Instant::now(),
                        held: true,
                    });
                }
                Err(e) if e.is_assertion_failed() => {
                    debug!(lock = name, "Lost the race for lock, waiting again");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Lock name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key holding the lock record
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder id written into the lock record
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether this guard still believes it holds the lock
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Push the expiry forward by the lock's expiration.
    ///
    /// Fails with [`KvError::AssertionFailed`] if the record changed, meaning
    /// the lock expired and was taken over; the guard then no longer holds
    /// it.
    pub fn refresh(&mut self) -> Result<()> {
        if !self.held {
            return Err(KvError::LockUnavailable(self.name.clone()));
        }
        let record = lock_record(&self.id, self.expiration);
        let txn = self.store.begin_transaction();
        self.store.assert_value(&self.key, Some(&self.record), Some(&txn))?;
        self.store.set(&self.key, record.clone(), Some(&txn))?;
        match self.store.apply_transaction(&txn) {
            Ok(()) => {
                self.record = record;
                debug!(lock = %self.name, "Refreshed lock");
                Ok(())
            }
            Err(e) => {
                if e.is_assertion_failed() {
                    warn!(lock = %self.name, "Lock was taken over by another holder");
                    self.held = false;
                }
                Err(e)
            }
        }
    }

    /// Release the lock now, reporting store errors.
    pub fn release(mut self) -> Result<()> {
        self.release_held()
    }

    fn release_held(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        let txn = self.store.begin_transaction();
        self.store.assert_value(&self.key, Some(&self.record), Some(&txn))?;
        self.store.delete(&self.key, false, Some(&txn))?;
        match self.store.apply_transaction(&txn) {
            Ok(()) => debug!(lock = %self.name, "Released lock"),
            Err(e) if e.is_assertion_failed() => {
                warn!(lock = %self.name, "Lock record changed before release, leaving it")
            }
            Err(e) => return Err(e),
        }

        let held_for = self.acquired_at.elapsed();
        if held_for > LONG_HOLD {
            warn!(lock = %self.name, held_ms = held_for.as_millis() as u64, "Lock held for a long time");
        }
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> Drop for StoreLock<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.release_held() {
            warn!(lock = %self.name, error = %e, "Failed to release lock");
        }
    }
}

impl<S: KeyValueStore + ?Sized> std::fmt::Debug for StoreLock<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("held", &self.held)
            .finish()
    }
}

/// Store key of the lock called `name`
pub fn lock_key(name: &str) -> String {
    format!("{}{}", LOCK_PREFIX, name)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn lock_record(id: &Uuid, expiration: Duration) -> Value {
    let now = unix_now();
    Value::object([
        ("id", Value::from(id.to_string())),
        ("time_set", Value::Float(now)),
        (EXPIRES_FIELD, Value::Float(now + expiration.as_secs_f64())),
    ])
}

/// A record without a readable expiry counts as expired.
fn is_expired(record: &Value) -> bool {
    let expires = record
        .as_object()
        .and_then(|fields| fields.get(EXPIRES_FIELD))
        .and_then(|v| v.as_float().or_else(|| v.as_int().map(|i| i as f64)));
    match expires {
        Some(expires) => unix_now() > expires,
        None => true,
    }
}

fn remove_if_unchanged<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    current: &Value,
) -> Result<()> {
    let txn = store.begin_transaction();
    store.assert_value(key, Some(current), Some(&txn))?;
    store.delete(key, false, Some(&txn))?;
    match store.apply_transaction(&txn) {
        Ok(()) => Ok(()),
        Err(e) if e.is_assertion_failed() => {
            warn!(key, "Lost the race to remove an expired lock");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
