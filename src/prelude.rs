//! Convenient imports for Keystone.
//!
//! ```
//! use keystone::prelude::*;
//!
//! let db = Keystone::ephemeral()?;
//! db.kv.set("key", Value::from("value"), None)?;
//! # Ok::<(), keystone::Error>(())
//! ```

// Main entry point
pub use crate::database::{Keystone, KeystoneBuilder};
pub use crate::config::KeystoneConfig;

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use keystone_core::Value;

// Key-value store
pub use keystone_kv::{KeyValueStore, MemoryStore, TransactionId};

// Entities
pub use keystone_dal::{Entity, EntitySchema, Property, PropertyType};
