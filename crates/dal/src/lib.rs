//! Entity persistence layer for Keystone
//!
//! Declares entity types ([`EntitySchema`]) with typed properties, lazy
//! many-to-one relations and computed attributes, and persists instances
//! ([`Entity`]) to a relational backend ([`Connector`], provided for SQLite
//! by [`SqliteConnector`]).
//!
//! # Schema evolution
//!
//! Tables are created and extended on first use. Migration is additive
//! only: declared columns missing from the live table are appended; nothing
//! is dropped or renamed.
//!
//! # Relations
//!
//! A relation `machine` on `Disk` stores the target identifier in column
//! `_machine_id`. From the disk, [`Entity::related`] loads the machine on
//! first access and caches it. From the machine, [`Entity::reverse`] with
//! the declared reverse name lists the disks, querying every time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod connector;
pub mod dal;
pub mod entity;
pub mod error;
pub mod migrate;
pub mod registry;
pub mod schema;
pub mod sqlite;

pub use connector::{ColumnDef, ColumnInfo, ColumnKind, Connector, Record, SqlValue};
pub use dal::Dal;
pub use entity::{Entity, EntityState, RelationCell};
pub use error::{DalError, Result};
pub use migrate::TableState;
pub use registry::{EntityRegistry, InboundRelation};
pub use schema::{Dynamic, DynamicFn, EntitySchema, EntitySchemaBuilder, Property, PropertyType, Relation};
pub use sqlite::{SqliteConfig, SqliteConnector};
