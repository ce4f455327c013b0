//! Core types for Keystone
//!
//! This crate defines the value model shared by the key-value store and the
//! entity persistence layer:
//! - [`Value`]: the canonical stored value
//! - [`json`]: canonical (sorted-key) JSON encoding of values

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod json;
pub mod value;

pub use json::JsonError;
pub use value::{SpecialFloatKind, Value};
