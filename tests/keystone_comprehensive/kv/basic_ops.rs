//! Basic Key-Value Operations Tests
//!
//! Tests for get, set, delete, exists, prefix scans and multi-get.

use crate::*;
use keystone::KvError;

// =============================================================================
// GET / SET TESTS
// =============================================================================

#[test]
fn test_set_and_get_roundtrip() {
    let store = create_store();

    store.set("key1", Value::Int(42), None).unwrap();
    assert_eq!(store.get("key1").unwrap(), Value::Int(42));
}

#[test]
fn test_get_nonexistent_is_not_found() {
    let store = create_store();

    let err = store.get("nonexistent").unwrap_err();
    assert!(matches!(err, KvError::NotFound(ref key) if key == "nonexistent"));
}

#[test]
fn test_set_overwrites_existing() {
    let store = create_store();

    store.set("key", Value::Int(1), None).unwrap();
    store.set("key", Value::Int(2), None).unwrap();

    assert_eq!(store.get("key").unwrap(), Value::Int(2));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_set_all_value_types() {
    let store = create_store();

    for (name, value) in standard_test_values() {
        let key = format!("type:{}", name);
        store.set(&key, value.clone(), None).unwrap();
        assert_eq!(store.get(&key).unwrap(), value, "Failed for type: {}", name);
    }
}

#[test]
fn test_null_value_is_present() {
    let store = create_store();

    store.set("nothing", Value::Null, None).unwrap();
    assert!(store.exists("nothing").unwrap());
    assert_eq!(store.get("nothing").unwrap(), Value::Null);
}

// =============================================================================
// DELETE TESTS
// =============================================================================

#[test]
fn test_delete_existing() {
    let store = create_store();

    store.set("key", Value::Int(1), None).unwrap();
    store.delete("key", true, None).unwrap();
    assert!(!store.exists("key").unwrap());
}

#[test]
fn test_delete_missing_with_must_exist_fails() {
    let store = create_store();
    assert!(store.delete("ghost", true, None).unwrap_err().is_not_found());
}

#[test]
fn test_delete_missing_without_must_exist_is_noop() {
    let store = create_store();
    store.delete("ghost", false, None).unwrap();
    assert!(store.is_empty());
}

// =============================================================================
// PREFIX TESTS
// =============================================================================

#[test]
fn test_prefix_scan_selects_matching_keys() {
    let store = create_store();
    for key in ["a/1", "a/2", "b/1"] {
        store.set(key, Value::Int(1), None).unwrap();
    }

    assert_eq!(store.prefix("a/").unwrap(), vec!["a/1", "a/2"]);
    assert_eq!(store.prefix("b/").unwrap(), vec!["b/1"]);
    assert!(store.prefix("c/").unwrap().is_empty());
}

#[test]
fn test_prefix_entries_returns_values() {
    let store = create_store();
    store.set("cfg/a", Value::Int(1), None).unwrap();
    store.set("cfg/b", Value::Int(2), None).unwrap();
    store.set("other", Value::Int(3), None).unwrap();

    assert_eq!(
        store.prefix_entries("cfg/").unwrap(),
        vec![
            ("cfg/a".to_string(), Value::Int(1)),
            ("cfg/b".to_string(), Value::Int(2)),
        ]
    );
}

#[test]
fn test_delete_prefix() {
    let store = create_store();
    for key in ["a/1", "a/2", "b/1"] {
        store.set(key, Value::Int(1), None).unwrap();
    }

    assert_eq!(store.delete_prefix("a/", None).unwrap(), 2);
    assert_eq!(store.prefix("").unwrap(), vec!["b/1"]);
    assert_eq!(store.delete_prefix("a/", None).unwrap(), 0);
}

// =============================================================================
// MULTI-GET TESTS
// =============================================================================

#[test]
fn test_get_multi_in_order() {
    let store = create_store();
    store.set("x", Value::Int(1), None).unwrap();
    store.set("y", Value::Int(2), None).unwrap();

    let values: Vec<_> = store
        .get_multi(["y", "x"], true)
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(values, vec![Some(Value::Int(2)), Some(Value::Int(1))]);
}

#[test]
fn test_get_multi_missing_key() {
    let store = create_store();
    store.set("x", Value::Int(1), None).unwrap();

    let strict: Vec<_> = store.get_multi(["x", "missing", "x"], true).collect();
    assert_eq!(strict.len(), 2);
    assert!(strict[0].is_ok());
    assert!(strict[1].is_err());

    let lenient: Vec<_> = store
        .get_multi(["x", "missing"], false)
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(lenient, vec![Some(Value::Int(1)), None]);
}

// =============================================================================
// TYPED HELPERS
// =============================================================================

#[test]
fn test_typed_json_helpers() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Lease {
        owner: String,
        ttl: u32,
    }

    let store = create_store();
    let lease = Lease {
        owner: "node-1".into(),
        ttl: 30,
    };
    store.set_json("lease", &lease, None).unwrap();

    assert_eq!(store.get_json::<Lease>("lease").unwrap(), lease);
    assert!(store.get_json::<Lease>("missing").unwrap_err().is_not_found());
}

#[test]
fn test_nop_and_clear() {
    let store = create_store();
    store.nop().unwrap();
    store.set("k", Value::Null, None).unwrap();
    store.begin_transaction();
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.pending_transactions(), 0);
}
