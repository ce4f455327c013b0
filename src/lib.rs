//! # Keystone
//!
//! Embedded transactional key-value store and auto-migrating entity
//! persistence layer.
//!
//! Keystone bundles two independent components behind one handle:
//!
//! - [`MemoryStore`] - an ordered key-value store with prefix scans,
//!   assertions and all-or-nothing transactions
//! - [`Dal`] - typed entities with lazy relations, computed attributes and
//!   additive schema migration over SQLite
//!
//! ## Quick Start
//!
//! ```
//! use keystone::prelude::*;
//!
//! let db = Keystone::builder()
//!     .entity(
//!         EntitySchema::builder("Machine")
//!             .property(Property::new("name", PropertyType::String).unique())
//!             .build()?,
//!     )
//!     .entity(
//!         EntitySchema::builder("Disk")
//!             .property(Property::new("serial", PropertyType::String))
//!             .relation("machine", "Machine", "disks")
//!             .build()?,
//!     )
//!     .open()?;
//!
//! // Key-value store with an optimistic transaction
//! let txn = db.kv.begin_transaction();
//! db.kv.assert_value("config/owner", None, Some(&txn))?;
//! db.kv.set("config/owner", Value::from("node-1"), Some(&txn))?;
//! db.kv.apply_transaction(&txn)?;
//!
//! // Entities
//! let mut machine = db.dal.create("Machine")?;
//! machine.set("name", "node-1")?;
//! machine.save()?;
//!
//! let mut disk = db.dal.create("Disk")?;
//! disk.set("serial", "S1")?;
//! disk.set_relation("machine", Some(&machine))?;
//! disk.save()?;
//!
//! assert_eq!(machine.reverse("disks")?.len(), 1);
//! # Ok::<(), keystone::Error>(())
//! ```

#![warn(missing_docs)]

mod config;
mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use config::KeystoneConfig;
pub use database::{Keystone, KeystoneBuilder};
pub use error::{Error, Result};

// Re-export component crates
pub use keystone_core::{json, Value};
pub use keystone_dal::{
    Connector, Dal, DalError, Entity, EntityRegistry, EntitySchema, EntityState, Property,
    PropertyType, RelationCell, SqliteConfig, SqliteConnector,
};
pub use keystone_kv::{
    KeyValueStore, KvError, MemoryStore, StoreLock, StoreRegistry, TransactionId,
    DEFAULT_LOCK_EXPIRATION,
};
