//! Key-Value Transaction Tests
//!
//! Tests for buffered operations, commit atomicity, assertions and the
//! retrying callback transaction.

use crate::*;
use keystone::KvError;
use std::cell::Cell;

// =============================================================================
// BUFFERING
// =============================================================================

#[test]
fn test_buffered_writes_apply_in_order() {
    let store = create_store();
    let txn = store.begin_transaction();

    store.set("k", Value::Int(1), Some(&txn)).unwrap();
    store.set("k", Value::Int(2), Some(&txn)).unwrap();
    store.delete("gone", false, Some(&txn)).unwrap();
    assert!(!store.exists("k").unwrap());

    store.apply_transaction(&txn).unwrap();
    assert_eq!(store.get("k").unwrap(), Value::Int(2));
}

#[test]
fn test_set_then_delete_in_one_transaction() {
    let store = create_store();
    let txn = store.begin_transaction();
    store.set("k", Value::Int(1), Some(&txn)).unwrap();
    store.delete("k", true, Some(&txn)).unwrap();
    store.apply_transaction(&txn).unwrap();
    assert!(!store.exists("k").unwrap());
}

#[test]
fn test_delete_prefix_in_transaction_sees_earlier_sets() {
    let store = create_store();
    store.set("a/1", Value::Int(1), None).unwrap();

    let txn = store.begin_transaction();
    store.set("a/2", Value::Int(2), Some(&txn)).unwrap();
    assert_eq!(store.delete_prefix("a/", Some(&txn)).unwrap(), 0);
    store.set("a/3", Value::Int(3), Some(&txn)).unwrap();
    store.apply_transaction(&txn).unwrap();

    assert_eq!(store.prefix("a/").unwrap(), vec!["a/3"]);
}

// =============================================================================
// ATOMICITY
// =============================================================================

#[test]
fn test_failed_assertion_discards_whole_transaction() {
    let store = create_store();
    store.set("B", Value::String("y".into()), None).unwrap();

    let txn = store.begin_transaction();
    store.set("A", Value::Int(1), Some(&txn)).unwrap();
    store
        .assert_value("B", Some(&Value::String("x".into())), Some(&txn))
        .unwrap();
    store.set("A", Value::Int(2), Some(&txn)).unwrap();

    let err = store.apply_transaction(&txn).unwrap_err();
    assert!(matches!(err, KvError::AssertionFailed(ref key) if key == "B"));
    assert!(!store.exists("A").unwrap());
    assert_eq!(store.get("B").unwrap(), Value::String("y".into()));
}

#[test]
fn test_failed_required_delete_restores_prior_writes() {
    let store = create_store();
    store.set("keep", Value::Int(1), None).unwrap();

    let txn = store.begin_transaction();
    store.delete("keep", true, Some(&txn)).unwrap();
    store.delete("missing", true, Some(&txn)).unwrap();

    let err = store.apply_transaction(&txn).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_precondition_failure());
    assert_eq!(store.get("keep").unwrap(), Value::Int(1));
}

#[test]
fn test_assertions_see_state_at_commit_time() {
    let store = create_store();
    let txn = store.begin_transaction();
    store.assert_exists("late", Some(&txn)).unwrap();

    store.set("late", Value::Int(1), None).unwrap();
    store.apply_transaction(&txn).unwrap();
}

#[test]
fn test_assert_value_uses_canonical_comparison() {
    let store = create_store();
    let mut m = BTreeMap::new();
    m.insert("b".to_string(), Value::Int(2));
    m.insert("a".to_string(), Value::Int(1));
    store.set("doc", Value::Object(m.clone()), None).unwrap();

    store
        .assert_value("doc", Some(&Value::Object(m)), None)
        .unwrap();
    assert!(store
        .assert_value("doc", Some(&Value::Int(1)), None)
        .unwrap_err()
        .is_assertion_failed());
}

// =============================================================================
// HANDLE LIFECYCLE
// =============================================================================

#[test]
fn test_unknown_transaction_handle() {
    let store = create_store();
    let other = MemoryStore::new("other");
    let foreign = other.begin_transaction();

    assert!(matches!(
        store.set("k", Value::Null, Some(&foreign)),
        Err(KvError::TransactionNotFound(_))
    ));
    assert!(matches!(
        store.apply_transaction(&foreign),
        Err(KvError::TransactionNotFound(_))
    ));
}

#[test]
fn test_handle_is_consumed_even_when_commit_fails() {
    let store = create_store();
    let txn = store.begin_transaction();
    store.assert_exists("missing", Some(&txn)).unwrap();

    assert!(store.apply_transaction(&txn).is_err());
    assert!(matches!(
        store.apply_transaction(&txn),
        Err(KvError::TransactionNotFound(_))
    ));
    assert_eq!(store.pending_transactions(), 0);
}

#[test]
fn test_delete_transaction() {
    let store = create_store();
    let txn = store.begin_transaction();
    store.set("k", Value::Int(1), Some(&txn)).unwrap();
    store.delete_transaction(&txn).unwrap();

    assert!(store.apply_transaction(&txn).is_err());
    assert!(!store.exists("k").unwrap());
}

// =============================================================================
// CALLBACK TRANSACTIONS
// =============================================================================

#[test]
fn test_callback_transaction_claims_free_key() {
    let store = create_store();
    store
        .apply_callback_transaction(
            |s| {
                let txn = s.begin_transaction();
                s.assert_value("owner", None, Some(&txn))?;
                s.set("owner", Value::from("me"), Some(&txn))?;
                Ok(txn)
            },
            0,
            None,
        )
        .unwrap();
    assert_eq!(store.get("owner").unwrap(), Value::from("me"));
}

#[test]
fn test_callback_transaction_retries_with_fresh_state() {
    let store = create_store();
    store.set("n", Value::Int(0), None).unwrap();
    let calls = Cell::new(0usize);
    let waited = Cell::new(Vec::new());

    store
        .apply_callback_transaction(
            |s| {
                calls.set(calls.get() + 1);
                let current = s.get("n")?;
                if calls.get() <= 2 {
                    // Another writer sneaks in before the commit.
                    let bumped = current.as_int().unwrap_or(0) + 100;
                    s.set("n", Value::Int(bumped), None)?;
                }
                let txn = s.begin_transaction();
                s.assert_value("n", Some(&current), Some(&txn))?;
                s.set("n", Value::Int(current.as_int().unwrap_or(0) + 1), Some(&txn))?;
                Ok(txn)
            },
            5,
            Some(&|attempt| {
                let mut seen = waited.take();
                seen.push(attempt);
                waited.set(seen);
            }),
        )
        .unwrap();

    assert_eq!(calls.get(), 3);
    assert_eq!(waited.take(), vec![1, 2]);
    assert_eq!(store.get("n").unwrap(), Value::Int(201));
}

#[test]
fn test_callback_errors_are_returned_without_retry() {
    let store = create_store();
    let calls = Cell::new(0usize);
    let err = store
        .apply_callback_transaction(
            |s| {
                calls.set(calls.get() + 1);
                s.get("missing")?;
                Ok(s.begin_transaction())
            },
            3,
            Some(&|_| {}),
        )
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_errors_convert_to_keystone_errors() {
    let store = create_store();
    let txn = store.begin_transaction();
    store.assert_exists("missing", Some(&txn)).unwrap();

    let err: keystone::Error = store.apply_transaction(&txn).unwrap_err().into();
    assert!(err.is_conflict());
    assert!(err.is_retryable());
}

#[test]
fn test_deferred_assertion_does_not_confuse_bytes_with_objects() {
    let store = create_store();
    store
        .set("blob", Value::object([("$bytes", Value::from("aGk="))]), None)
        .unwrap();

    let txn = store.begin_transaction();
    store
        .assert_value("blob", Some(&Value::Bytes(b"hi".to_vec())), Some(&txn))
        .unwrap();
    store.set("blob", Value::Null, Some(&txn)).unwrap();

    assert!(matches!(
        store.apply_transaction(&txn),
        Err(KvError::AssertionFailed(_))
    ));
    assert!(store.get("blob").unwrap().as_object().is_some());
}
