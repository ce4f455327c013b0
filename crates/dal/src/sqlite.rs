//! SQLite connector
//!
//! One connection behind an `Arc<Mutex<_>>`; every connector call locks it
//! for exactly one statement (or one short statement group), which gives
//! each call its own scoped connection acquisition.

use crate::connector::{ColumnDef, ColumnInfo, Connector, Record, SqlValue};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

const MEMORY_PATH: &str = ":memory:";

/// SQLite connector settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// How long a locked database is retried before failing
    pub busy_timeout_ms: u64,
    /// Enforce foreign keys at the engine level
    pub foreign_keys: bool,
}

impl SqliteConfig {
    /// File-backed database at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout_ms: 5000,
            foreign_keys: false,
        }
    }

    /// Private in-memory database
    pub fn memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    /// Set the busy timeout
    pub fn with_busy_timeout(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    /// Toggle engine-level foreign key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Whether this is an in-memory database
    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(MEMORY_PATH)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::memory()
    }
}

/// [`Connector`] over a single SQLite connection
#[derive(Clone)]
pub struct SqliteConnector {
    conn: Arc<Mutex<Connection>>,
    config: SqliteConfig,
}

impl SqliteConnector {
    /// Open (creating if needed) the database described by `config`
    pub fn open(config: SqliteConfig) -> Result<Self> {
        info!(path = ?config.path, "Opening SQLite database");

        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(&config.path)?
        };

        let connector = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        connector.configure_pragmas()?;
        Ok(connector)
    }

    /// Open a private in-memory database
    pub fn memory() -> Result<Self> {
        Self::open(SqliteConfig::memory())
    }

    /// Connector settings
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run `f` with the connection locked
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    fn configure_pragmas(&self) -> Result<()> {
        debug!(
            busy_timeout_ms = self.config.busy_timeout_ms,
            foreign_keys = self.config.foreign_keys,
            "Configuring SQLite pragmas"
        );
        self.with_connection(|conn| {
            conn.busy_timeout(std::time::Duration::from_millis(
                self.config.busy_timeout_ms,
            ))?;
            if self.config.foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for SqliteConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnector")
            .field("config", &self.config)
            .finish()
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn render_column(column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", quote(&column.name), column.kind.sql_type());
    if column.primary_key {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    sql
}

impl Connector for SqliteConnector {
    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<()> {
        let body = columns
            .iter()
            .map(render_column)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", quote(table), body);
        self.with_connection(|conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        // ALTER TABLE cannot add UNIQUE, nor NOT NULL without a default.
        let relaxed = ColumnDef::new(column.name.clone(), column.kind);
        let alter = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(table),
            render_column(&relaxed)
        );
        self.with_connection(|conn| {
            conn.execute_batch(&alter)?;
            if column.unique {
                let index = format!("{}_{}_unique", table, column.name);
                conn.execute_batch(&format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote(&index),
                    quote(table),
                    quote(&column.name)
                ))?;
            }
            Ok(())
        })
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
            let rows = stmt.query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get("name")?,
                    not_null: row.get::<_, i64>("notnull")? != 0,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn insert(&self, table: &str, values: &[(String, SqlValue)]) -> Result<i64> {
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(table))
        } else {
            let names = values
                .iter()
                .map(|(name, _)| quote(name))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table),
                names,
                placeholders
            )
        };
        self.with_connection(|conn| {
            conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn update(&self, table: &str, id: i64, values: &[(String, SqlValue)]) -> Result<usize> {
        let assignments = if values.is_empty() {
            "id = id".to_string()
        } else {
            values
                .iter()
                .map(|(name, _)| format!("{} = ?", quote(name)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sql = format!("UPDATE {} SET {} WHERE id = ?", quote(table), assignments);
        let id_param = SqlValue::Integer(id);
        let params = values.iter().map(|(_, v)| v).chain(std::iter::once(&id_param));
        self.with_connection(|conn| Ok(conn.execute(&sql, params_from_iter(params))?))
    }

    fn delete(&self, table: &str, id: i64) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE id = ?", quote(table));
        self.with_connection(|conn| Ok(conn.execute(&sql, [id])?))
    }

    fn select_by_id(&self, table: &str, id: i64) -> Result<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", quote(table));
        trace!(table, id, "Selecting row");
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let record = stmt
                .query_row([id], |row| {
                    let mut record = Record::new();
                    for (index, name) in names.iter().enumerate() {
                        record.insert(name.clone(), row.get::<_, SqlValue>(index)?);
                    }
                    Ok(record)
                })
                .optional()?;
            Ok(record)
        })
    }

    fn select_ids(&self, table: &str, filter: Option<(&str, &SqlValue)>) -> Result<Vec<i64>> {
        self.with_connection(|conn| {
            let ids = match filter {
                Some((column, value)) => {
                    let sql = format!(
                        "SELECT id FROM {} WHERE {} IS ? ORDER BY id",
                        quote(table),
                        quote(column)
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([value], |row| row.get::<_, i64>(0))?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let sql = format!("SELECT id FROM {} ORDER BY id", quote(table));
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(ids)
        })
    }
}
