//! Main database entry point for Keystone.
//!
//! This module provides the `Keystone` struct, which bundles the
//! transactional key-value store and the entity data access layer.

use crate::config::KeystoneConfig;
use crate::error::Result;
use keystone_dal::{Dal, EntityRegistry, EntitySchema, SqliteConnector};
use keystone_kv::{MemoryStore, StoreRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// The Keystone database.
///
/// Create one with [`Keystone::open`], [`Keystone::ephemeral`] or
/// [`Keystone::builder`].
///
/// # Example
///
/// ```
/// use keystone::prelude::*;
///
/// let db = Keystone::builder()
///     .entity(
///         EntitySchema::builder("Machine")
///             .property(Property::new("name", PropertyType::String))
///             .build()?,
///     )
///     .open()?;
///
/// db.kv.set("settings/mode", Value::from("fast"), None)?;
///
/// let mut machine = db.dal.create("Machine")?;
/// machine.set("name", "node-1")?;
/// machine.save()?;
/// # Ok::<(), keystone::Error>(())
/// ```
pub struct Keystone {
    /// Key-value store for the configured cluster
    pub kv: Arc<MemoryStore>,

    /// Entity data access layer
    pub dal: Dal,

    stores: Arc<StoreRegistry>,
    config: KeystoneConfig,
}

impl Keystone {
    /// Open a database whose relational data lives in `dir/main.db`.
    ///
    /// No entity types are registered; use [`Keystone::builder`] to declare
    /// them.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(dir).open()
    }

    /// Open a database that keeps everything in memory.
    pub fn ephemeral() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for database configuration.
    pub fn builder() -> KeystoneBuilder {
        KeystoneBuilder::new()
    }

    /// Effective configuration
    pub fn config(&self) -> &KeystoneConfig {
        &self.config
    }

    /// Registry the key-value store was taken from
    pub fn stores(&self) -> &Arc<StoreRegistry> {
        &self.stores
    }

    /// Relational database file, or `None` when in memory
    pub fn database_path(&self) -> Option<PathBuf> {
        self.config.database_path()
    }

    /// Check if the relational data lives in memory.
    pub fn is_ephemeral(&self) -> bool {
        self.config.is_ephemeral()
    }
}

impl std::fmt::Debug for Keystone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystone")
            .field("config", &self.config)
            .field("kv", &self.kv)
            .field("dal", &self.dal)
            .finish()
    }
}

/// Builder for database configuration.
///
/// # Example
///
/// ```no_run
/// use keystone::Keystone;
///
/// let db = Keystone::builder()
///     .path("./data")
///     .cluster("ovs")
///     .busy_timeout_ms(10_000)
///     .open()?;
/// # Ok::<(), keystone::Error>(())
/// ```
pub struct KeystoneBuilder {
    config: KeystoneConfig,
    entities: Vec<EntitySchema>,
    stores: Option<Arc<StoreRegistry>>,
}

impl KeystoneBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(KeystoneConfig::default())
    }

    /// Start from an existing configuration.
    pub fn from_config(config: KeystoneConfig) -> Self {
        Self {
            config,
            entities: Vec::new(),
            stores: None,
        }
    }

    /// Set the data directory (relational data goes to disk).
    pub fn path(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the database file name inside the data directory.
    pub fn database_file(mut self, name: impl Into<String>) -> Self {
        self.config.database_file = name.into();
        self
    }

    /// Set the key-value cluster name.
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.config.cluster = cluster.into();
        self
    }

    /// Set the SQLite busy timeout.
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.config.busy_timeout_ms = millis;
        self
    }

    /// Toggle engine-level foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.config.foreign_keys = enabled;
        self
    }

    /// Register an entity type.
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    /// Register several entity types.
    pub fn entities(mut self, schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        self.entities.extend(schemas);
        self
    }

    /// Take the key-value store from a shared registry, so several
    /// databases on the same cluster see the same data.
    pub fn store_registry(mut self, stores: Arc<StoreRegistry>) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Keystone> {
        self.config.validate()?;

        let registry = EntityRegistry::new(self.entities)?;
        let connector = SqliteConnector::open(self.config.sqlite_config())?;
        let dal = Dal::new(Arc::new(connector), registry);
        for entity in dal.registry().entity_types() {
            dal.ensure_table(entity)?;
        }

        let stores = self.stores.unwrap_or_default();
        let kv = stores.get_or_create(&self.config.cluster);

        info!(
            path = ?self.config.database_path(),
            cluster = %self.config.cluster,
            entity_types = dal.registry().entity_types().count(),
            "Opened Keystone database"
        );

        Ok(Keystone {
            kv,
            dal,
            stores,
            config: self.config,
        })
    }
}

impl Default for KeystoneBuilder {
    fn default() -> Self {
        Self::new()
    }
}
