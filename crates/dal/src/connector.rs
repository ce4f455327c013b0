//! Relational storage contract
//!
//! The entity layer never builds SQL itself. It describes columns with
//! [`ColumnDef`], moves scalars as [`SqlValue`], and asks a [`Connector`] to
//! render and run the statements.

use crate::error::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::collections::HashMap;

/// Column storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Signed integer
    Integer,
    /// UTF-8 text
    Text,
}

impl ColumnKind {
    /// SQL type name
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// Engine-agnostic column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Storage class
    pub kind: ColumnKind,
    /// Auto-incrementing primary key
    pub primary_key: bool,
    /// Reject NULL
    pub not_null: bool,
    /// Reject duplicate values
    pub unique: bool,
}

impl ColumnDef {
    /// An INTEGER column
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    /// A TEXT column
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    /// A column of the given kind, nullable and without constraints
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            not_null: false,
            unique: false,
        }
    }

    /// Mark as the auto-incrementing primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Set the NOT NULL constraint
    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Set the UNIQUE constraint
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// Live column as reported by introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Whether the engine enforces NOT NULL
    pub not_null: bool,
}

impl ColumnInfo {
    /// Relation columns are the ones prefixed with `_`
    pub fn is_relation(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// A scalar crossing the storage boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// INTEGER
    Integer(i64),
    /// TEXT
    Text(String),
}

impl SqlValue {
    /// Kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Text(_) => "text",
        }
    }

    /// Integer payload, if any
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        v.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::from(*i),
            SqlValue::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for SqlValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(SqlValue::Null),
            ValueRef::Integer(i) => Ok(SqlValue::Integer(i)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| SqlValue::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Real(_) | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// One row, addressable by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, SqlValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.insert(column.into(), value);
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// Row identifier
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(SqlValue::as_integer)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Relational backend used by the entity layer
///
/// Table and column names handed to a connector have already been
/// validated as plain identifiers. Each call is its own atomic unit.
pub trait Connector: Send + Sync {
    /// Create `table` with `columns` unless it already exists.
    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<()>;

    /// Append a column to an existing table.
    ///
    /// Engines that cannot add the column with its constraints in place
    /// must emulate them as closely as they can.
    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()>;

    /// Describe the live columns of `table`, in table order.
    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Insert a row and return its generated identifier.
    fn insert(&self, table: &str, values: &[(String, SqlValue)]) -> Result<i64>;

    /// Overwrite the row with identifier `id`; returns the affected row count.
    fn update(&self, table: &str, id: i64, values: &[(String, SqlValue)]) -> Result<usize>;

    /// Delete the row with identifier `id`; returns the affected row count.
    fn delete(&self, table: &str, id: i64) -> Result<usize>;

    /// Fetch the row with identifier `id`.
    fn select_by_id(&self, table: &str, id: i64) -> Result<Option<Record>>;

    /// Identifiers of rows whose `column` equals `value` (NULL matches NULL),
    /// or of every row when `filter` is `None`, ascending.
    fn select_ids(&self, table: &str, filter: Option<(&str, &SqlValue)>) -> Result<Vec<i64>>;
}
