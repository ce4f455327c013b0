//! Named Lock Tests
//!
//! Tests for expiring locks taken through the key-value store.

use crate::*;
use keystone::{KvError, DEFAULT_LOCK_EXPIRATION};
use std::thread;
use std::time::Duration;

fn lock_keys(store: &MemoryStore) -> Vec<String> {
    store.prefix("/keystone/locks/").unwrap()
}

#[test]
fn test_lock_guard_releases_on_drop() {
    let store = create_store();
    {
        let guard = store
            .lock("migration", Some(Duration::from_millis(50)), DEFAULT_LOCK_EXPIRATION)
            .unwrap();
        assert_eq!(lock_keys(&store), vec![guard.key().to_string()]);
    }
    assert!(lock_keys(&store).is_empty());
}

#[test]
fn test_busy_lock_reports_unavailable() {
    let store = create_store();
    let _held = store.lock("migration", None, DEFAULT_LOCK_EXPIRATION).unwrap();

    let err = store
        .lock("migration", Some(Duration::from_millis(10)), DEFAULT_LOCK_EXPIRATION)
        .unwrap_err();
    assert!(matches!(err, KvError::LockUnavailable(ref name) if name == "migration"));

    let err: keystone::Error = err.into();
    assert!(err.is_retryable());
}

#[test]
fn test_waiter_takes_over_expired_lock() {
    let store = create_store();
    let abandoned = store
        .lock("migration", None, Duration::from_millis(10))
        .unwrap();
    std::mem::forget(abandoned);

    let guard = store
        .lock("migration", Some(Duration::from_secs(2)), DEFAULT_LOCK_EXPIRATION)
        .unwrap();
    assert!(guard.is_held());
    assert_eq!(lock_keys(&store).len(), 1);
}

#[test]
fn test_waiter_gets_lock_after_holder_releases() {
    let store = create_store();
    let guard = store.lock("migration", None, DEFAULT_LOCK_EXPIRATION).unwrap();

    let waiter = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            store
                .lock("migration", Some(Duration::from_secs(5)), DEFAULT_LOCK_EXPIRATION)
                .map(|g| g.id())
        })
    };

    thread::sleep(Duration::from_millis(20));
    let holder = guard.id();
    guard.release().unwrap();

    let next = waiter.join().unwrap().unwrap();
    assert_ne!(next, holder);
    assert!(lock_keys(&store).is_empty());
}
