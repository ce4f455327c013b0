//! Additive schema migration
//!
//! [`ensure_table`] brings a table in line with its [`EntitySchema`]:
//! create it when absent, then append every declared property or relation
//! column the live table lacks. Columns are never dropped or renamed, so
//! rows written under an older declaration stay readable and their new
//! columns read back as null.

use crate::connector::{ColumnDef, ColumnInfo, ColumnKind, Connector};
use crate::error::Result;
use crate::schema::{EntitySchema, Property, Relation};
use std::collections::BTreeSet;
use tracing::debug;

/// Live table layout after migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableState {
    /// Columns in table order
    pub columns: Vec<ColumnInfo>,
    /// Mandatory properties whose column was added without NOT NULL and so
    /// must be checked before every write
    pub unenforced_mandatory: BTreeSet<String>,
}

impl TableState {
    /// Check whether `property` needs an explicit null check on save
    pub fn needs_mandatory_check(&self, property: &str) -> bool {
        self.unenforced_mandatory.contains(property)
    }
}

/// Column definition for a property
pub fn property_column(property: &Property) -> ColumnDef {
    let kind = if property.kind().is_integer_column() {
        ColumnKind::Integer
    } else {
        ColumnKind::Text
    };
    ColumnDef::new(property.name(), kind)
        .not_null(property.is_mandatory())
        .unique(property.is_unique())
}

/// Column definition for a relation's foreign key
pub fn relation_column(relation: &Relation) -> ColumnDef {
    ColumnDef::integer(relation.column())
}

/// Create or extend the table behind `schema`. Idempotent.
pub fn ensure_table(connector: &dyn Connector, schema: &EntitySchema) -> Result<TableState> {
    let table = schema.table();

    let mut columns = vec![ColumnDef::integer("id").primary_key()];
    columns.extend(schema.properties().iter().map(property_column));
    columns.extend(schema.relations().iter().map(relation_column));
    connector.create_table(table, &columns)?;

    let live = connector.columns(table)?;
    let (relation_columns, property_columns): (BTreeSet<&str>, BTreeSet<&str>) = {
        let (rel, prop): (Vec<&ColumnInfo>, Vec<&ColumnInfo>) =
            live.iter().partition(|c| c.is_relation());
        (
            rel.into_iter().map(|c| c.name.as_str()).collect(),
            prop.into_iter().map(|c| c.name.as_str()).collect(),
        )
    };

    let mut added = Vec::new();
    for property in schema.properties() {
        if !property_columns.contains(property.name()) {
            connector.add_column(table, &property_column(property))?;
            added.push(property.name().to_string());
        }
    }
    for relation in schema.relations() {
        let column = relation.column();
        if !relation_columns.contains(column.as_str()) {
            connector.add_column(table, &relation_column(relation))?;
            added.push(column);
        }
    }

    let columns = if added.is_empty() {
        live
    } else {
        debug!(entity = schema.name(), table, columns = ?added, "Added columns");
        connector.columns(table)?
    };

    let unenforced_mandatory = schema
        .properties()
        .iter()
        .filter(|p| p.is_mandatory())
        .filter(|p| {
            !columns
                .iter()
                .any(|c| c.name == p.name() && c.not_null)
        })
        .map(|p| p.name().to_string())
        .collect();

    Ok(TableState {
        columns,
        unenforced_mandatory,
    })
}
