//! Property value codec
//!
//! | type | column | write | read |
//! |---|---|---|---|
//! | int | INTEGER | identity | integer |
//! | bool | INTEGER | true→1, false→0 | 1→true, else false |
//! | str | TEXT | identity | identity |
//! | list / dict / untyped | TEXT | canonical JSON | JSON decode |
//!
//! `Null` is written as SQL NULL for every type and reads back as `Null`,
//! so a mandatory column never receives a non-null placeholder.

use crate::connector::SqlValue;
use crate::error::{DalError, Result};
use crate::schema::{Property, PropertyType};
use keystone_core::{json, Value};

/// Convert a property value to its column representation.
///
/// Fails with [`DalError::InvalidValue`] when the value kind does not match
/// the declared type.
pub fn serialize(property: &Property, value: &Value) -> Result<SqlValue> {
    let kind = property.kind();
    match (kind, value) {
        (_, Value::Null) => Ok(SqlValue::Null),
        (PropertyType::Int, Value::Int(i)) => Ok(SqlValue::Integer(*i)),
        (PropertyType::Bool, Value::Bool(b)) => Ok(SqlValue::Integer(i64::from(*b))),
        (PropertyType::String, Value::String(s)) => Ok(SqlValue::Text(s.clone())),
        (PropertyType::List, Value::Array(_))
        | (PropertyType::Dict, Value::Object(_))
        | (PropertyType::Untyped, _) => Ok(SqlValue::Text(json::encode(value))),
        _ => Err(mismatch(property, value.type_name())),
    }
}

/// Convert a column value back to a property value.
pub fn deserialize(property: &Property, stored: SqlValue) -> Result<Value> {
    match (property.kind(), stored) {
        (_, SqlValue::Null) => Ok(Value::Null),
        (PropertyType::Int, SqlValue::Integer(i)) => Ok(Value::Int(i)),
        (PropertyType::Bool, SqlValue::Integer(i)) => Ok(Value::Bool(i == 1)),
        (PropertyType::String, SqlValue::Text(s)) => Ok(Value::String(s)),
        (PropertyType::List | PropertyType::Dict | PropertyType::Untyped, SqlValue::Text(text)) => {
            Ok(json::decode(&text)?)
        }
        (_, other) => Err(mismatch(property, other.kind_name())),
    }
}

fn mismatch(property: &Property, found: &str) -> DalError {
    DalError::InvalidValue {
        property: property.name().to_string(),
        expected: property.kind(),
        found: found.to_string(),
    }
}
