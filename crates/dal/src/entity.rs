//! Entity instances
//!
//! An [`Entity`] is one row of a registered type, held in memory. Scalar
//! properties are plain values; each relation is a [`RelationCell`] that
//! holds the foreign identifier and, once accessed, the related instance.
//! Nothing is written until [`Entity::save`]; there is no autosave.
//!
//! # Lifecycle
//!
//! ```text
//! New (id = None) --save--> Persisted --save--> Persisted
//!                                     --delete--> Deleted (terminal)
//! ```

use crate::codec;
use crate::connector::{Record, SqlValue};
use crate::dal::Dal;
use crate::error::{DalError, Result};
use crate::schema::{EntitySchema, Relation};
use keystone_core::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where an instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Never saved; no identifier
    New,
    /// Backed by a row
    Persisted,
    /// Row deleted; the instance is unusable
    Deleted,
}

/// Lazily resolved many-to-one reference
#[derive(Debug, Clone)]
pub enum RelationCell {
    /// No related instance
    Empty,
    /// Foreign identifier known, instance not loaded yet
    Unresolved(i64),
    /// Foreign identifier and the loaded instance
    Resolved(i64, Box<Entity>),
}

impl RelationCell {
    /// Foreign identifier held by the cell
    pub fn id(&self) -> Option<i64> {
        match self {
            RelationCell::Empty => None,
            RelationCell::Unresolved(id) | RelationCell::Resolved(id, _) => Some(*id),
        }
    }

    /// Whether the related instance has been loaded
    pub fn is_resolved(&self) -> bool {
        matches!(self, RelationCell::Resolved(..))
    }
}

/// One instance of a registered entity type
#[derive(Clone)]
pub struct Entity {
    dal: Dal,
    schema: Arc<EntitySchema>,
    id: Option<i64>,
    state: EntityState,
    values: BTreeMap<String, Value>,
    relations: BTreeMap<String, RelationCell>,
}

impl Entity {
    pub(crate) fn blank(dal: Dal, schema: Arc<EntitySchema>) -> Self {
        let values = schema
            .properties()
            .iter()
            .map(|p| (p.name().to_string(), Value::Null))
            .collect();
        let relations = schema
            .relations()
            .iter()
            .map(|r| (r.name().to_string(), RelationCell::Empty))
            .collect();
        Self {
            dal,
            schema,
            id: None,
            state: EntityState::New,
            values,
            relations,
        }
    }

    pub(crate) fn from_record(
        dal: Dal,
        schema: Arc<EntitySchema>,
        id: i64,
        record: &Record,
    ) -> Result<Self> {
        let mut entity = Self::blank(dal, schema);
        entity.id = Some(id);
        entity.state = EntityState::Persisted;

        let schema = Arc::clone(&entity.schema);
        for property in schema.properties() {
            let stored = record.get(property.name()).cloned().unwrap_or(SqlValue::Null);
            entity
                .values
                .insert(property.name().to_string(), codec::deserialize(property, stored)?);
        }
        for relation in schema.relations() {
            let cell = match record.get(&relation.column()) {
                None | Some(SqlValue::Null) => RelationCell::Empty,
                Some(SqlValue::Integer(id)) => RelationCell::Unresolved(*id),
                Some(other) => {
                    return Err(DalError::InvalidRelation {
                        relation: relation.name().to_string(),
                        reason: format!("stored foreign id is {}", other.kind_name()),
                    })
                }
            };
            entity.relations.insert(relation.name().to_string(), cell);
        }
        Ok(entity)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Entity type name
    pub fn entity_type(&self) -> &str {
        self.schema.name()
    }

    /// Descriptor table of this instance's type
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Identifier, `None` until first saved
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Lifecycle state
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Whether the instance has never been saved
    pub fn is_new(&self) -> bool {
        self.state == EntityState::New
    }

    /// Whether the instance has been deleted
    pub fn is_deleted(&self) -> bool {
        self.state == EntityState::Deleted
    }

    /// The data access layer this instance belongs to
    pub fn dal(&self) -> &Dal {
        &self.dal
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Read an attribute.
    ///
    /// Accepts `id`, a property, a `<relation>_id` attribute or a dynamic
    /// attribute. Dynamic attributes are recomputed on every call.
    pub fn get(&self, name: &str) -> Result<Value> {
        if name == "id" {
            return Ok(self.id.map(Value::Int).unwrap_or(Value::Null));
        }
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(relation) = self.schema.relation_by_id_attribute(name) {
            return Ok(self.cell_id(relation).map(Value::Int).unwrap_or(Value::Null));
        }
        if let Some(dynamic) = self.schema.dynamic(name) {
            return dynamic.evaluate(self);
        }
        Err(self.unknown(name))
    }

    /// Write a property.
    ///
    /// The value must match the property's semantic type (or be `Null`).
    /// Identifiers and dynamic attributes are read-only; relations are
    /// assigned with [`Entity::set_relation`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(property) = self.schema.property(name) {
            codec::serialize(property, &value)?;
            self.values.insert(name.to_string(), value);
            return Ok(());
        }
        if name == "id"
            || self.schema.relation_by_id_attribute(name).is_some()
            || self.schema.dynamic(name).is_some()
        {
            return Err(DalError::ReadOnlyAttribute {
                entity: self.entity_type().to_string(),
                name: name.to_string(),
            });
        }
        if self.schema.relation(name).is_some() {
            return Err(DalError::InvalidRelation {
                relation: name.to_string(),
                reason: "relations are assigned with set_relation".to_string(),
            });
        }
        Err(self.unknown(name))
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Foreign identifier of relation `name`, without loading anything
    pub fn relation_id(&self, name: &str) -> Result<Option<i64>> {
        let relation = self.relation_decl(name)?;
        Ok(self.cell_id(relation))
    }

    /// The instance related through `name`, loaded on first access and
    /// cached in the relation cell afterwards.
    ///
    /// A foreign identifier whose row no longer exists fails with
    /// [`DalError::ObjectNotFound`].
    pub fn related(&mut self, name: &str) -> Result<Option<&Entity>> {
        self.ensure_live()?;
        let schema = Arc::clone(&self.schema);
        let relation = Self::lookup_relation(&schema, name)?;

        let cell = self
            .relations
            .entry(relation.name().to_string())
            .or_insert(RelationCell::Empty);
        if let RelationCell::Unresolved(id) = *cell {
            let target = self.dal.load(relation.target(), id)?;
            *cell = RelationCell::Resolved(id, Box::new(target));
        }
        Ok(match &*cell {
            RelationCell::Resolved(_, entity) => Some(&**entity),
            _ => None,
        })
    }

    /// Current state of relation `name`'s cell, without loading anything
    pub fn relation_cell(&self, name: &str) -> Result<&RelationCell> {
        let relation = self.relation_decl(name)?;
        self.relations
            .get(relation.name())
            .ok_or_else(|| self.unknown(name))
    }

    /// Point relation `name` at `target`, or clear it with `None`.
    ///
    /// `target` must be a saved instance of the relation's declared type.
    pub fn set_relation(&mut self, name: &str, target: Option<&Entity>) -> Result<()> {
        self.ensure_live()?;
        let schema = Arc::clone(&self.schema);
        let relation = Self::lookup_relation(&schema, name)?;

        let cell = match target {
            None => RelationCell::Empty,
            Some(target) => {
                if target.entity_type() != relation.target() {
                    return Err(DalError::InvalidRelation {
                        relation: name.to_string(),
                        reason: format!(
                            "expected {}, got {}",
                            relation.target(),
                            target.entity_type()
                        ),
                    });
                }
                target.ensure_live()?;
                let id = target.require_id()?;
                RelationCell::Resolved(id, Box::new(target.clone()))
            }
        };
        self.relations.insert(name.to_string(), cell);
        Ok(())
    }

    /// Every instance pointing at this one through the inbound relation
    /// registered as `name`, by ascending identifier.
    ///
    /// Always queries storage; the result is not cached.
    pub fn reverse(&self, name: &str) -> Result<Vec<Entity>> {
        self.ensure_live()?;
        let id = self.require_id()?;
        let inbound = self
            .dal
            .registry()
            .inbound(self.entity_type(), name)
            .ok_or_else(|| self.unknown(name))?;

        let owner = self.dal.schema(&inbound.owner)?;
        self.dal.table_state(&owner)?;
        let ids = self
            .dal
            .connector()
            .select_ids(owner.table(), Some((inbound.column.as_str(), &SqlValue::Integer(id))))?;
        self.dal.load_all(owner.name(), ids)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write this instance: insert when new (assigning the identifier),
    /// otherwise update its row.
    pub fn save(&mut self) -> Result<()> {
        self.ensure_live()?;
        let table = self.dal.table_state(&self.schema)?;

        let mut row = Vec::with_capacity(self.values.len() + self.relations.len());
        for property in self.schema.properties() {
            let value = self.values.get(property.name()).unwrap_or(&Value::Null);
            if value.is_null() && property.is_mandatory() && table.needs_mandatory_check(property.name())
            {
                return Err(DalError::MissingMandatory {
                    entity: self.entity_type().to_string(),
                    property: property.name().to_string(),
                });
            }
            row.push((property.name().to_string(), codec::serialize(property, value)?));
        }
        for relation in self.schema.relations() {
            row.push((relation.column(), SqlValue::from(self.cell_id(relation))));
        }

        let connector = self.dal.connector();
        match self.id {
            None => {
                let id = connector.insert(self.schema.table(), &row)?;
                debug!(entity = self.entity_type(), id, "Inserted row");
                self.id = Some(id);
                self.state = EntityState::Persisted;
            }
            Some(id) => {
                if connector.update(self.schema.table(), id, &row)? == 0 {
                    warn!(entity = self.entity_type(), id, "Row vanished before update");
                    return Err(self.not_found(id));
                }
                debug!(entity = self.entity_type(), id, "Updated row");
            }
        }
        Ok(())
    }

    /// Delete this instance's row. No cascade: rows pointing at it keep
    /// their foreign identifier.
    pub fn delete(&mut self) -> Result<()> {
        self.ensure_live()?;
        let id = self.require_id()?;
        if self.dal.connector().delete(self.schema.table(), id)? == 0 {
            return Err(self.not_found(id));
        }
        debug!(entity = self.entity_type(), id, "Deleted row");
        self.state = EntityState::Deleted;
        Ok(())
    }

    /// Snapshot of the instance: `id`, every property, `<relation>_id` for
    /// each relation and every dynamic attribute.
    pub fn export(&self) -> Result<Value> {
        let mut data = BTreeMap::new();
        data.insert(
            "id".to_string(),
            self.id.map(Value::Int).unwrap_or(Value::Null),
        );
        for (name, value) in &self.values {
            data.insert(name.clone(), value.clone());
        }
        for relation in self.schema.relations() {
            let id = self.cell_id(relation);
            data.insert(
                relation.id_attribute(),
                id.map(Value::Int).unwrap_or(Value::Null),
            );
        }
        for dynamic in self.schema.dynamics() {
            data.insert(dynamic.name().to_string(), dynamic.evaluate(self)?);
        }
        Ok(Value::Object(data))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn cell_id(&self, relation: &Relation) -> Option<i64> {
        self.relations.get(relation.name()).and_then(RelationCell::id)
    }

    fn relation_decl(&self, name: &str) -> Result<&Relation> {
        Self::lookup_relation(&self.schema, name)
    }

    fn lookup_relation<'s>(schema: &'s EntitySchema, name: &str) -> Result<&'s Relation> {
        schema.relation(name).ok_or_else(|| DalError::UnknownAttribute {
            entity: schema.name().to_string(),
            name: name.to_string(),
        })
    }

    fn ensure_live(&self) -> Result<()> {
        match (self.state, self.id) {
            (EntityState::Deleted, Some(id)) => Err(DalError::Deleted {
                entity: self.entity_type().to_string(),
                id,
            }),
            _ => Ok(()),
        }
    }

    fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| DalError::NotPersisted {
            entity: self.entity_type().to_string(),
        })
    }

    fn unknown(&self, name: &str) -> DalError {
        DalError::UnknownAttribute {
            entity: self.entity_type().to_string(),
            name: name.to_string(),
        }
    }

    fn not_found(&self, id: i64) -> DalError {
        DalError::ObjectNotFound {
            entity: self.entity_type().to_string(),
            id,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "<{} (id: {})>", self.entity_type(), id),
            None => write!(f, "<{} (id: None)>", self.entity_type()),
        }
    }
}

impl fmt::Display for Entity {
    /// Pretty JSON of [`Entity::export`], keys sorted
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exported = match self.export() {
            Ok(value) => value,
            Err(e) => return write!(f, "{:?} (export failed: {})", self, e),
        };
        let text = serde_json::to_string_pretty(&json::to_plain_json(&exported)).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
