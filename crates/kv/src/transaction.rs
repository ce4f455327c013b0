//! Transaction handles and buffered operations
//!
//! A transaction is an ordered buffer of [`Operation`]s recorded against a
//! [`TransactionId`]. Nothing touches the live mapping until the buffer is
//! committed with `apply_transaction`.

use keystone_core::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-unique transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Create a new random handle using UUID v4
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded store operation
///
/// The same type drives immediate execution and deferred (buffered)
/// execution, so an operation behaves identically inside and outside a
/// transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Store `value` under `key`
    Set {
        /// Target key
        key: String,
        /// Value to store
        value: Value,
    },
    /// Remove `key`; fail with `NotFound` when absent and `must_exist`
    Delete {
        /// Target key
        key: String,
        /// Whether a missing key is an error
        must_exist: bool,
    },
    /// Remove every key starting with `prefix`
    DeletePrefix {
        /// Key prefix
        prefix: String,
    },
    /// `Some(v)`: `key` must hold `v`. `None`: `key` must be absent.
    AssertValue {
        /// Target key
        key: String,
        /// Expected value, or `None` for "absent"
        expected: Option<Value>,
    },
    /// `key` must exist
    AssertExists {
        /// Target key
        key: String,
    },
}

impl Operation {
    /// Short operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Set { .. } => "set",
            Operation::Delete { .. } => "delete",
            Operation::DeletePrefix { .. } => "delete_prefix",
            Operation::AssertValue { .. } => "assert_value",
            Operation::AssertExists { .. } => "assert_exists",
        }
    }

    /// Whether this operation is an optimistic-concurrency guard
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Operation::AssertValue { .. } | Operation::AssertExists { .. }
        )
    }
}
