//! Error types for the key-value store

use crate::transaction::TransactionId;
use keystone_core::JsonError;
use thiserror::Error;

/// Key-value store error type
#[derive(Debug, Error)]
pub enum KvError {
    /// Key absent on a read or delete that requires it
    #[error("key not found: {0}")]
    NotFound(String),

    /// An assertion (immediate or deferred to commit) did not hold
    #[error("assertion failed for key: {0}")]
    AssertionFailed(String),

    /// Transaction handle unknown or already consumed
    #[error("unknown transaction: {0}")]
    TransactionNotFound(TransactionId),

    /// A named lock stayed taken for longer than the caller would wait
    #[error("could not acquire lock: {0}")]
    LockUnavailable(String),

    /// Typed value could not be converted to or from a stored value
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for key-value store operations
pub type Result<T> = std::result::Result<T, KvError>;

impl KvError {
    /// Check if this is a missing-key error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound(_))
    }

    /// Check if this is a failed assertion.
    pub fn is_assertion_failed(&self) -> bool {
        matches!(self, KvError::AssertionFailed(_))
    }

    /// Check if a lock could not be acquired in time.
    pub fn is_lock_unavailable(&self) -> bool {
        matches!(self, KvError::LockUnavailable(_))
    }

    /// Check if this error aborts a transaction as a failed precondition.
    ///
    /// Both a missing key (required by a buffered delete) and a failed
    /// assertion qualify.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, KvError::NotFound(_) | KvError::AssertionFailed(_))
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<JsonError> for KvError {
    fn from(e: JsonError) -> Self {
        KvError::Serialization(e.to_string())
    }
}
