//! Database configuration.
//!
//! [`KeystoneConfig`] can be built in code, through
//! [`crate::KeystoneBuilder`], or loaded from TOML:
//!
//! ```toml
//! data_dir = "/var/lib/keystone"
//! database_file = "main.db"
//! cluster = "default"
//! busy_timeout_ms = 5000
//! foreign_keys = false
//! ```
//!
//! Every field is optional; omitted fields take their defaults. Without a
//! `data_dir` the relational data lives in memory.

use crate::error::{Error, Result};
use keystone_dal::SqliteConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default relational database file name inside `data_dir`
pub const DEFAULT_DATABASE_FILE: &str = "main.db";

/// Default key-value cluster name
pub const DEFAULT_CLUSTER: &str = "default";

/// Default SQLite busy timeout
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Keystone configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoneConfig {
    /// Directory holding the relational database; `None` keeps it in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Database file name inside `data_dir`
    pub database_file: String,
    /// Key-value store namespace
    pub cluster: String,
    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
    /// Enforce foreign keys at the engine level
    pub foreign_keys: bool,
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: false,
        }
    }
}

impl KeystoneConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Check field values.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.is_empty() {
            return Err(Error::Config("cluster name must not be empty".into()));
        }
        if self.database_file.is_empty() {
            return Err(Error::Config("database_file must not be empty".into()));
        }
        if Path::new(&self.database_file).components().count() != 1 {
            return Err(Error::Config(format!(
                "database_file must be a plain file name, got {}",
                self.database_file
            )));
        }
        Ok(())
    }

    /// Whether the relational data lives in memory
    pub fn is_ephemeral(&self) -> bool {
        self.data_dir.is_none()
    }

    /// Full path of the relational database file, if on disk
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(&self.database_file))
    }

    /// Connector settings derived from this configuration
    pub fn sqlite_config(&self) -> SqliteConfig {
        let base = match self.database_path() {
            Some(path) => SqliteConfig::new(path),
            None => SqliteConfig::memory(),
        };
        base.with_busy_timeout(self.busy_timeout_ms)
            .with_foreign_keys(self.foreign_keys)
    }
}
