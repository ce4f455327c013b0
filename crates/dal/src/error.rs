//! Error types for the entity persistence layer

use crate::schema::PropertyType;
use keystone_core::JsonError;
use thiserror::Error;

/// Entity persistence error type
#[derive(Debug, Error)]
pub enum DalError {
    /// No row with this identifier
    #[error("{entity} with id {id} not found")]
    ObjectNotFound {
        /// Entity type name
        entity: String,
        /// Requested identifier
        id: i64,
    },

    /// Unknown semantic type name
    #[error("the type {0} is not supported. Supported types: int, str, list, dict, bool, untyped")]
    UnsupportedType(String),

    /// Value kind does not match the property's semantic type
    #[error("invalid value for {property}: expected {expected}, found {found}")]
    InvalidValue {
        /// Property name
        property: String,
        /// Declared semantic type
        expected: PropertyType,
        /// Kind that was supplied or stored
        found: String,
    },

    /// Relation misuse (wrong target type, bad declaration)
    #[error("invalid relation {relation}: {reason}")]
    InvalidRelation {
        /// Relation name
        relation: String,
        /// What went wrong
        reason: String,
    },

    /// Attribute name not declared on the entity type
    #[error("{entity} has no attribute {name}")]
    UnknownAttribute {
        /// Entity type name
        entity: String,
        /// Requested attribute
        name: String,
    },

    /// Attempt to write an identifier, foreign id or dynamic attribute
    #[error("attribute {name} of {entity} is read-only")]
    ReadOnlyAttribute {
        /// Entity type name
        entity: String,
        /// Attribute name
        name: String,
    },

    /// Entity type not registered
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Invalid entity declaration or registration
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Mandatory property is null at save time
    #[error("mandatory property {property} of {entity} is null")]
    MissingMandatory {
        /// Entity type name
        entity: String,
        /// Property name
        property: String,
    },

    /// Operation on an entity that has been deleted
    #[error("{entity} with id {id} has been deleted")]
    Deleted {
        /// Entity type name
        entity: String,
        /// Identifier of the deleted row
        id: i64,
    },

    /// Operation requires a persisted entity
    #[error("{entity} has not been saved yet")]
    NotPersisted {
        /// Entity type name
        entity: String,
    },

    /// Storage constraint violation (UNIQUE, NOT NULL)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Stored JSON text could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other storage engine error
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Filesystem error while opening a database
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for entity persistence operations
pub type Result<T> = std::result::Result<T, DalError>;

impl DalError {
    /// Check if this is a missing-row error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DalError::ObjectNotFound { .. })
    }

    /// Check if this is a storage constraint violation.
    pub fn is_constraint(&self) -> bool {
        matches!(self, DalError::Constraint(_))
    }

    /// Check if the caller supplied a bad value or attribute name.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            DalError::UnsupportedType(_)
                | DalError::InvalidValue { .. }
                | DalError::InvalidRelation { .. }
                | DalError::UnknownAttribute { .. }
                | DalError::ReadOnlyAttribute { .. }
                | DalError::UnknownEntityType(_)
                | DalError::MissingMandatory { .. }
        )
    }
}

impl From<rusqlite::Error> for DalError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DalError::Constraint(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => DalError::Sqlite(e),
        }
    }
}

impl From<JsonError> for DalError {
    fn from(e: JsonError) -> Self {
        DalError::Serialization(e.to_string())
    }
}
