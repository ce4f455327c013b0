//! Canonical JSON codec for Keystone values
//!
//! Encodes [`Value`] to JSON text with deterministic (ascending) key order and
//! decodes it back. Two wrappers keep the mapping lossless:
//! - `$bytes` for binary data (base64)
//! - `$f64` for special floats (NaN, ±Inf, -0.0)
//!
//! Object keys starting with `$` belong to the codec: a user key `$k` is
//! written as `$$k` and read back as `$k`, so no user object can be taken
//! for a wrapper.
//!
//! Whole floats keep their decimal point (`1.0`), so `Float(1.0)` and `Int(1)`
//! stay distinct after a round trip.

use crate::value::{SpecialFloatKind, Value};
use base64::Engine;
use serde_json::{Map, Number};
use thiserror::Error;

const BYTES_TAG: &str = "$bytes";
const F64_TAG: &str = "$f64";
const TAG_SIGIL: char = '$';

/// JSON decode errors
#[derive(Debug, Error)]
pub enum JsonError {
    /// Invalid JSON syntax
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Invalid base64 in `$bytes` wrapper
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Invalid value in `$f64` wrapper
    #[error("invalid $f64 value: {0}")]
    InvalidF64Wrapper(String),

    /// Number that fits neither i64 nor f64
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// Convert a value into a `serde_json::Value`
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(f) => match SpecialFloatKind::of(*f) {
            Some(kind) => tagged(F64_TAG, kind.to_wire_string().to_string()),
            // Finite by construction, so from_f64 cannot fail here.
            None => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => tagged(
            BYTES_TAG,
            base64::engine::general_purpose::STANDARD.encode(b),
        ),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(to_json).collect()),
        Value::Object(obj) => serde_json::Value::Object(
            obj.iter().map(|(k, v)| (escape_key(k), to_json(v))).collect(),
        ),
    }
}

/// Convert a `serde_json::Value` into a value, unwrapping `$bytes` / `$f64`
pub fn from_json(json: serde_json::Value) -> Result<Value, JsonError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => decode_number(&n)?,
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(
            arr.into_iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(obj) => decode_object(obj)?,
    })
}

/// Convert a value into plain JSON for typed deserialization and display.
///
/// No wrapper is emitted and keys are kept as they are: bytes become an
/// array of numbers and special floats become `null`.
pub fn to_plain_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter()
                .map(|byte| serde_json::Value::Number(Number::from(*byte)))
                .collect(),
        ),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(to_plain_json).collect()),
        Value::Object(obj) => serde_json::Value::Object(
            obj.iter().map(|(k, v)| (k.clone(), to_plain_json(v))).collect(),
        ),
        other => to_json(other),
    }
}

/// Convert plain JSON (for example from `serde_json::to_value`) into a
/// value. Nothing in it is read as a wrapper.
pub fn from_plain_json(json: serde_json::Value) -> Result<Value, JsonError> {
    Ok(match json {
        serde_json::Value::Array(arr) => Value::Array(
            arr.into_iter()
                .map(from_plain_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(obj) => {
            let mut out = std::collections::BTreeMap::new();
            for (k, v) in obj {
                out.insert(k, from_plain_json(v)?);
            }
            Value::Object(out)
        }
        other => from_json(other)?,
    })
}

/// Encode a value as canonical JSON text (keys sorted)
pub fn encode(value: &Value) -> String {
    to_json(value).to_string()
}

/// Decode canonical JSON text
pub fn decode(text: &str) -> Result<Value, JsonError> {
    from_json(serde_json::from_str(text)?)
}

fn tagged(tag: &str, payload: String) -> serde_json::Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), serde_json::Value::String(payload));
    serde_json::Value::Object(map)
}

fn decode_number(n: &Number) -> Result<Value, JsonError> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Int(i))
    } else if let Some(f) = n.as_f64() {
        Ok(Value::Float(f))
    } else {
        Err(JsonError::InvalidNumber(n.to_string()))
    }
}

fn decode_object(obj: Map<String, serde_json::Value>) -> Result<Value, JsonError> {
    if obj.len() == 1 {
        match obj.iter().next() {
            Some((tag, serde_json::Value::String(payload))) if tag == BYTES_TAG => {
                return base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map(Value::Bytes)
                    .map_err(|e| JsonError::InvalidBase64(e.to_string()));
            }
            Some((tag, serde_json::Value::String(payload))) if tag == F64_TAG => {
                return SpecialFloatKind::from_wire_string(payload)
                    .map(|kind| Value::Float(kind.to_f64()))
                    .ok_or_else(|| JsonError::InvalidF64Wrapper(payload.clone()));
            }
            _ => {}
        }
    }
    let mut out = std::collections::BTreeMap::new();
    for (k, v) in obj {
        out.insert(unescape_key(k), from_json(v)?);
    }
    Ok(Value::Object(out))
}

fn escape_key(key: &str) -> String {
    if key.starts_with(TAG_SIGIL) {
        format!("{}{}", TAG_SIGIL, key)
    } else {
        key.to_string()
    }
}

fn unescape_key(key: String) -> String {
    match key.strip_prefix(TAG_SIGIL) {
        Some(rest) if rest.starts_with(TAG_SIGIL) => rest.to_string(),
        _ => key,
    }
}
