//! Value types for Keystone
//!
//! This module defines the canonical [`Value`] type stored by the key-value
//! store and carried by entity properties.
//!
//! ## Equality
//!
//! - Different types are NEVER equal (no type coercion)
//! - `Int(1)` != `Float(1.0)`
//! - `String("abc")` != `Bytes([97, 98, 99])`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//!
//! Objects are kept in a `BTreeMap`, so iteration and encoding are always in
//! ascending key order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical Keystone value
///
/// `Clone` is a deep copy: no variant shares storage with its clone, which
/// is what the key-value store relies on to keep caller state and stored
/// state apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// JSON null / absence of value
    Null,

    /// Boolean true or false
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit IEEE-754 floating point
    Float(f64),

    /// UTF-8 encoded string
    String(String),

    /// Arbitrary binary data
    /// NOT equivalent to String - distinct type
    Bytes(Vec<u8>),

    /// Ordered sequence of values
    Array(Vec<Value>),

    /// String-keyed map of values, sorted by key
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as array slice
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get as object reference
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Build an object from `(key, value)` pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Get the special float kind if this is a special float
    ///
    /// Special floats (NaN, ±Inf, -0.0) have no plain JSON number form and
    /// are wrapped as `{"$f64": "..."}` by the JSON codec.
    pub fn special_float_kind(&self) -> Option<SpecialFloatKind> {
        match self {
            Value::Float(f) => SpecialFloatKind::of(*f),
            _ => None,
        }
    }
}

/// Kinds of special float values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFloatKind {
    /// IEEE-754 Not-a-Number
    NaN,
    /// IEEE-754 positive infinity (+Inf)
    PositiveInfinity,
    /// IEEE-754 negative infinity (-Inf)
    NegativeInfinity,
    /// IEEE-754 negative zero (-0.0)
    NegativeZero,
}

impl SpecialFloatKind {
    /// Classify a float, returning `None` for ordinary values
    pub fn of(f: f64) -> Option<Self> {
        if f.is_nan() {
            Some(SpecialFloatKind::NaN)
        } else if f == f64::INFINITY {
            Some(SpecialFloatKind::PositiveInfinity)
        } else if f == f64::NEG_INFINITY {
            Some(SpecialFloatKind::NegativeInfinity)
        } else if f == 0.0 && f.is_sign_negative() {
            Some(SpecialFloatKind::NegativeZero)
        } else {
            None
        }
    }

    /// Convert to wire encoding string
    pub fn to_wire_string(&self) -> &'static str {
        match self {
            SpecialFloatKind::NaN => "NaN",
            SpecialFloatKind::PositiveInfinity => "+Inf",
            SpecialFloatKind::NegativeInfinity => "-Inf",
            SpecialFloatKind::NegativeZero => "-0.0",
        }
    }

    /// Parse from wire encoding string
    pub fn from_wire_string(s: &str) -> Option<Self> {
        match s {
            "NaN" => Some(SpecialFloatKind::NaN),
            "+Inf" => Some(SpecialFloatKind::PositiveInfinity),
            "-Inf" => Some(SpecialFloatKind::NegativeInfinity),
            "-0.0" => Some(SpecialFloatKind::NegativeZero),
            _ => None,
        }
    }

    /// Convert to f64 value
    pub fn to_f64(&self) -> f64 {
        match self {
            SpecialFloatKind::NaN => f64::NAN,
            SpecialFloatKind::PositiveInfinity => f64::INFINITY,
            SpecialFloatKind::NegativeInfinity => f64::NEG_INFINITY,
            SpecialFloatKind::NegativeZero => -0.0,
        }
    }
}

// ============================================================================
// Equality (IEEE-754 semantics, no type coercion)
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
