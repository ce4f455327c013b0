//! Unified error types for Keystone.
//!
//! This module provides one error type that wraps the component errors
//! and presents a consistent interface to users.

use keystone_dal::DalError;
use keystone_kv::KvError;
use thiserror::Error;

/// All Keystone errors.
///
/// Component crates keep their own precise error types
/// ([`KvError`], [`DalError`]); this is the classification seen through
/// the top-level API.
#[derive(Debug, Error)]
pub enum Error {
    /// Key or row not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic precondition failed (assertion did not hold)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad value, attribute or type name supplied by the caller
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current state (deleted entity, unknown
    /// transaction)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage constraint violation (UNIQUE, NOT NULL)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage engine error
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for Keystone operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors (conflicts) may succeed when retried against fresh
    /// state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a storage constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }
}

// Convert from key-value store errors
impl From<KvError> for Error {
    fn from(e: KvError) -> Self {
        match e {
            KvError::NotFound(key) => Error::NotFound(format!("key {}", key)),
            KvError::AssertionFailed(key) => {
                Error::Conflict(format!("assertion failed for key {}", key))
            }
            KvError::LockUnavailable(name) => {
                Error::Conflict(format!("lock {} unavailable", name))
            }
            KvError::TransactionNotFound(id) => {
                Error::InvalidOperation(format!("unknown transaction {}", id))
            }
            KvError::Serialization(msg) => Error::Serialization(msg),
        }
    }
}

// Convert from entity layer errors
impl From<DalError> for Error {
    fn from(e: DalError) -> Self {
        match e {
            DalError::ObjectNotFound { .. } => Error::NotFound(e.to_string()),
            DalError::Constraint(msg) => Error::ConstraintViolation(msg),
            DalError::Deleted { .. } | DalError::NotPersisted { .. } => {
                Error::InvalidOperation(e.to_string())
            }
            DalError::Serialization(msg) => Error::Serialization(msg),
            DalError::Sqlite(inner) => Error::Storage(inner.to_string()),
            DalError::Io(inner) => Error::Io(inner),
            DalError::InvalidSchema(msg) => Error::Config(msg),
            DalError::UnsupportedType(_)
            | DalError::InvalidValue { .. }
            | DalError::InvalidRelation { .. }
            | DalError::UnknownAttribute { .. }
            | DalError::ReadOnlyAttribute { .. }
            | DalError::UnknownEntityType(_)
            | DalError::MissingMandatory { .. } => Error::InvalidInput(e.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Convert from TOML errors
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
