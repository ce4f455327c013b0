//! Entity type declarations
//!
//! An [`EntitySchema`] is the per-type descriptor table: its properties,
//! relations and dynamic attributes, built once and shared by every
//! instance of the type. Attribute access on [`crate::Entity`] dispatches
//! through it.
//!
//! # Example
//!
//! ```
//! use keystone_dal::{EntitySchema, Property, PropertyType};
//!
//! let schema = EntitySchema::builder("Disk")
//!     .property(Property::new("name", PropertyType::String).unique())
//!     .property(Property::new("size", PropertyType::Int).optional())
//!     .relation("machine", "Machine", "disks")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.table(), "disk");
//! assert_eq!(schema.relation("machine").unwrap().column(), "_machine_id");
//! ```

use crate::entity::Entity;
use crate::error::{DalError, Result};
use keystone_core::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Semantic type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// 64-bit integer
    Int,
    /// UTF-8 text
    String,
    /// Array, stored as JSON text
    List,
    /// Object, stored as JSON text
    Dict,
    /// Boolean, stored as 0/1
    Bool,
    /// Any value, stored as JSON text
    Untyped,
}

impl PropertyType {
    /// Canonical type name
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Int => "int",
            PropertyType::String => "str",
            PropertyType::List => "list",
            PropertyType::Dict => "dict",
            PropertyType::Bool => "bool",
            PropertyType::Untyped => "untyped",
        }
    }

    /// Whether values are stored as an INTEGER column
    pub fn is_integer_column(&self) -> bool {
        matches!(self, PropertyType::Int | PropertyType::Bool)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PropertyType {
    type Err = DalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" | "integer" => Ok(PropertyType::Int),
            "str" | "string" => Ok(PropertyType::String),
            "list" => Ok(PropertyType::List),
            "dict" => Ok(PropertyType::Dict),
            "bool" => Ok(PropertyType::Bool),
            "untyped" | "none" => Ok(PropertyType::Untyped),
            other => Err(DalError::UnsupportedType(other.to_string())),
        }
    }
}

/// A persisted scalar attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    kind: PropertyType,
    unique: bool,
    mandatory: bool,
}

impl Property {
    /// Declare a mandatory, non-unique property
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
            unique: false,
            mandatory: true,
        }
    }

    /// Declare a property from a type name such as `"int"` or `"dict"`
    pub fn parse(name: impl Into<String>, kind: &str) -> Result<Self> {
        Ok(Self::new(name, kind.parse()?))
    }

    /// Enforce uniqueness at the storage layer
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Allow null values
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Property name, also the column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type
    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    /// Whether values must be unique across rows
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether null is rejected
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}

/// Many-to-one reference from the declaring type to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    name: String,
    target: String,
    reverse: String,
}

impl Relation {
    /// Relation name on the owner
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target entity type name
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Name of the one-to-many accessor on the target
    pub fn reverse(&self) -> &str {
        &self.reverse
    }

    /// Foreign-key column holding the target's identifier
    pub fn column(&self) -> String {
        format!("_{}_id", self.name)
    }

    /// Attribute exposing the foreign identifier without resolving it
    pub fn id_attribute(&self) -> String {
        format!("{}_id", self.name)
    }
}

/// Computation behind a dynamic attribute
pub type DynamicFn = Arc<dyn Fn(&Entity) -> Result<Value> + Send + Sync>;

/// Read-only attribute computed on every access
#[derive(Clone)]
pub struct Dynamic {
    name: String,
    compute: DynamicFn,
}

impl Dynamic {
    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate against `entity`
    pub fn evaluate(&self, entity: &Entity) -> Result<Value> {
        (self.compute)(entity)
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dynamic").field("name", &self.name).finish()
    }
}

/// Descriptor table of one entity type
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    table: String,
    properties: Vec<Property>,
    relations: Vec<Relation>,
    dynamics: Vec<Dynamic>,
}

impl EntitySchema {
    /// Start declaring an entity type
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            table: None,
            properties: Vec::new(),
            relations: Vec::new(),
            dynamics: Vec::new(),
        }
    }

    /// Entity type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Properties in declared order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Relations in declared order
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Dynamic attributes in declared order
    pub fn dynamics(&self) -> &[Dynamic] {
        &self.dynamics
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a relation by name
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Look up a relation by its `<name>_id` attribute
    pub fn relation_by_id_attribute(&self, attribute: &str) -> Option<&Relation> {
        let name = attribute.strip_suffix("_id")?;
        self.relation(name)
    }

    /// Look up a dynamic attribute by name
    pub fn dynamic(&self, name: &str) -> Option<&Dynamic> {
        self.dynamics.iter().find(|d| d.name == name)
    }

    /// Check whether `name` is taken by any attribute of this type
    pub fn has_attribute(&self, name: &str) -> bool {
        name == "id"
            || self.property(name).is_some()
            || self.relation(name).is_some()
            || self.relation_by_id_attribute(name).is_some()
            || self.dynamic(name).is_some()
    }
}

/// Builder for [`EntitySchema`]
pub struct EntitySchemaBuilder {
    name: String,
    table: Option<String>,
    properties: Vec<Property>,
    relations: Vec<Relation>,
    dynamics: Vec<Dynamic>,
}

impl EntitySchemaBuilder {
    /// Override the table name (defaults to the lowercased type name)
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declare a property
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare a many-to-one relation to `target`, reachable from the
    /// target through `reverse`
    pub fn relation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        reverse: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation {
            name: name.into(),
            target: target.into(),
            reverse: reverse.into(),
        });
        self
    }

    /// Declare a dynamic attribute
    pub fn dynamic<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Entity) -> Result<Value> + Send + Sync + 'static,
    {
        self.dynamics.push(Dynamic {
            name: name.into(),
            compute: Arc::new(compute),
        });
        self
    }

    /// Validate and finish the declaration.
    ///
    /// Names end up in SQL, so type, table, property and relation names must
    /// be plain identifiers. Property names may not start with `_` (that
    /// prefix marks relation columns), and no two attributes may share a
    /// name, including the implicit `id` and `<relation>_id`.
    pub fn build(self) -> Result<EntitySchema> {
        let table = self
            .table
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase());
        check_identifier("entity type", &self.name)?;
        check_identifier("table", &table)?;

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert("id".to_string());
        let mut claim = |name: &str| -> Result<()> {
            if seen.insert(name.to_string()) {
                Ok(())
            } else {
                Err(DalError::InvalidSchema(format!(
                    "{}: duplicate attribute {}",
                    self.name, name
                )))
            }
        };

        for property in &self.properties {
            check_identifier("property", &property.name)?;
            if property.name.starts_with('_') {
                return Err(DalError::InvalidSchema(format!(
                    "{}: property {} may not start with '_'",
                    self.name, property.name
                )));
            }
            claim(&property.name)?;
        }
        for relation in &self.relations {
            check_identifier("relation", &relation.name)?;
            check_identifier("entity type", &relation.target)?;
            check_identifier("reverse relation", &relation.reverse)?;
            claim(&relation.name)?;
            claim(&relation.id_attribute())?;
        }
        for dynamic in &self.dynamics {
            claim(&dynamic.name)?;
        }

        Ok(EntitySchema {
            name: self.name,
            table,
            properties: self.properties,
            relations: self.relations,
            dynamics: self.dynamics,
        })
    }
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DalError::InvalidSchema(format!(
            "invalid {} name: {:?}",
            what, name
        )))
    }
}
