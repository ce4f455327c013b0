//! Key-Value Concurrency Tests
//!
//! Tests that commits are atomic with respect to concurrent readers and
//! that optimistic transactions serialize concurrent increments.

use crate::*;
use proptest::prelude::*;
use std::thread;

#[test]
fn test_concurrent_callback_increments_are_not_lost() {
    let store = create_store();
    store.set("counter", Value::Int(0), None).unwrap();

    let threads = 8;
    let per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..per_thread {
                    store
                        .apply_callback_transaction(
                            |s| {
                                let current = s.get("counter")?;
                                let txn = s.begin_transaction();
                                s.assert_value("counter", Some(&current), Some(&txn))?;
                                s.set(
                                    "counter",
                                    Value::Int(current.as_int().unwrap_or(0) + 1),
                                    Some(&txn),
                                )?;
                                Ok(txn)
                            },
                            usize::MAX,
                            Some(&|_| thread::yield_now()),
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(
        store.get("counter").unwrap(),
        Value::Int((threads * per_thread) as i64)
    );
    assert_eq!(store.pending_transactions(), 0);
}

#[test]
fn test_readers_never_see_partial_commit() {
    let store = create_store();
    store.set("pair/a", Value::Int(0), None).unwrap();
    store.set("pair/b", Value::Int(0), None).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=200 {
                let txn = store.begin_transaction();
                store.set("pair/a", Value::Int(i), Some(&txn)).unwrap();
                store.set("pair/b", Value::Int(i), Some(&txn)).unwrap();
                store.apply_transaction(&txn).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let entries = store.prefix_entries("pair/").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, entries[1].1);
    }
    writer.join().unwrap();
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-c]/[0-9]{1,2}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_prefix_returns_exactly_matching_keys(
        keys in proptest::collection::btree_set(key_strategy(), 0..20),
        prefix in "[a-c]/?",
    ) {
        let store = MemoryStore::new("prop");
        for key in &keys {
            store.set(key, Value::Null, None).unwrap();
        }

        let expected: Vec<String> = keys.iter().filter(|k| k.starts_with(&prefix)).cloned().collect();
        prop_assert_eq!(store.prefix(&prefix).unwrap(), expected);
    }

    #[test]
    fn prop_rejected_transaction_changes_nothing(
        seed in proptest::collection::btree_map(key_strategy(), 0i64..10, 1..10),
        writes in proptest::collection::vec((key_strategy(), 0i64..10), 1..10),
    ) {
        let store = MemoryStore::new("prop");
        for (key, value) in &seed {
            store.set(key, Value::Int(*value), None).unwrap();
        }
        let before = store.prefix_entries("").unwrap();

        let txn = store.begin_transaction();
        for (key, value) in &writes {
            store.set(key, Value::Int(*value), Some(&txn)).unwrap();
        }
        store.assert_value("z/guard", Some(&Value::Int(1)), Some(&txn)).unwrap();
        prop_assert!(store.apply_transaction(&txn).is_err());

        prop_assert_eq!(store.prefix_entries("").unwrap(), before);
    }
}
