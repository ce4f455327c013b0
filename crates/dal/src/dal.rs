//! Entry point of the entity layer

use crate::codec;
use crate::connector::{Connector, SqlValue};
use crate::entity::Entity;
use crate::error::{DalError, Result};
use crate::migrate::{self, TableState};
use crate::registry::EntityRegistry;
use crate::schema::EntitySchema;
use keystone_core::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

struct DalInner {
    connector: Arc<dyn Connector>,
    registry: EntityRegistry,
    tables: Mutex<HashMap<String, Arc<TableState>>>,
}

/// Entity data access layer
///
/// Cheap to clone; every clone shares the connector, the registry and the
/// per-type table state. Each table is migrated the first time its type is
/// used through this `Dal`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use keystone_dal::{Dal, EntityRegistry, EntitySchema, Property, PropertyType, SqliteConnector};
///
/// let registry = EntityRegistry::new([EntitySchema::builder("Machine")
///     .property(Property::new("name", PropertyType::String))
///     .build()
///     .unwrap()])
/// .unwrap();
/// let dal = Dal::new(Arc::new(SqliteConnector::memory().unwrap()), registry);
///
/// let mut machine = dal.create("Machine").unwrap();
/// machine.set("name", "node-1").unwrap();
/// machine.save().unwrap();
///
/// let loaded = dal.load("Machine", machine.id().unwrap()).unwrap();
/// assert_eq!(loaded.get("name").unwrap().as_str(), Some("node-1"));
/// ```
#[derive(Clone)]
pub struct Dal {
    inner: Arc<DalInner>,
}

impl Dal {
    /// Create a data access layer over `connector` for the registered types
    pub fn new(connector: Arc<dyn Connector>, registry: EntityRegistry) -> Self {
        debug!(
            entity_types = ?registry.entity_types().collect::<Vec<_>>(),
            "Creating data access layer"
        );
        Self {
            inner: Arc::new(DalInner {
                connector,
                registry,
                tables: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The relational backend
    pub fn connector(&self) -> &dyn Connector {
        self.inner.connector.as_ref()
    }

    /// The registered entity types
    pub fn registry(&self) -> &EntityRegistry {
        &self.inner.registry
    }

    /// Descriptor table of a registered type
    pub fn schema(&self, entity: &str) -> Result<Arc<EntitySchema>> {
        self.inner.registry.schema(entity).map(Arc::clone)
    }

    /// Migrate the table of `entity` (if not yet done) and describe it
    pub fn ensure_table(&self, entity: &str) -> Result<Arc<TableState>> {
        let schema = self.schema(entity)?;
        self.table_state(&schema)
    }

    pub(crate) fn table_state(&self, schema: &EntitySchema) -> Result<Arc<TableState>> {
        let mut tables = self.inner.tables.lock();
        if let Some(state) = tables.get(schema.name()) {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(migrate::ensure_table(self.connector(), schema)?);
        debug!(entity = schema.name(), table = schema.table(), "Table ready");
        tables.insert(schema.name().to_string(), Arc::clone(&state));
        Ok(state)
    }

    /// A blank, unsaved instance of `entity`
    pub fn create(&self, entity: &str) -> Result<Entity> {
        let schema = self.schema(entity)?;
        self.table_state(&schema)?;
        Ok(Entity::blank(self.clone(), schema))
    }

    /// Load the row of `entity` with identifier `id`.
    ///
    /// Relations are left unresolved until first accessed.
    pub fn load(&self, entity: &str, id: i64) -> Result<Entity> {
        let schema = self.schema(entity)?;
        self.table_state(&schema)?;
        let record = self
            .connector()
            .select_by_id(schema.table(), id)?
            .ok_or_else(|| DalError::ObjectNotFound {
                entity: entity.to_string(),
                id,
            })?;
        trace!(entity, id, "Loaded row");
        Entity::from_record(self.clone(), schema, id, &record)
    }

    /// Every instance of `entity`, by ascending identifier
    pub fn list(&self, entity: &str) -> Result<Vec<Entity>> {
        let schema = self.schema(entity)?;
        self.table_state(&schema)?;
        let ids = self.connector().select_ids(schema.table(), None)?;
        self.load_all(entity, ids)
    }

    /// Instances of `entity` whose `attribute` equals `value`, by ascending
    /// identifier.
    ///
    /// `attribute` is a property name or a `<relation>_id` attribute. The
    /// value is serialized as the property would be on save, so `Null`
    /// matches rows where the column is NULL.
    pub fn find(
        &self,
        entity: &str,
        attribute: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Entity>> {
        let schema = self.schema(entity)?;
        self.table_state(&schema)?;
        let value = value.into();

        let (column, stored) = if let Some(property) = schema.property(attribute) {
            (property.name().to_string(), codec::serialize(property, &value)?)
        } else if let Some(relation) = schema.relation_by_id_attribute(attribute) {
            let stored = match value {
                Value::Null => SqlValue::Null,
                Value::Int(id) => SqlValue::Integer(id),
                other => {
                    return Err(DalError::InvalidRelation {
                        relation: relation.name().to_string(),
                        reason: format!("foreign id must be int or null, got {}", other.type_name()),
                    })
                }
            };
            (relation.column(), stored)
        } else {
            return Err(DalError::UnknownAttribute {
                entity: entity.to_string(),
                name: attribute.to_string(),
            });
        };

        let ids = self
            .connector()
            .select_ids(schema.table(), Some((column.as_str(), &stored)))?;
        self.load_all(entity, ids)
    }

    pub(crate) fn load_all(&self, entity: &str, ids: Vec<i64>) -> Result<Vec<Entity>> {
        ids.into_iter().map(|id| self.load(entity, id)).collect()
    }
}

impl std::fmt::Debug for Dal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dal")
            .field("registry", &self.inner.registry)
            .finish()
    }
}
