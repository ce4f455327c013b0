//! Entity type registry
//!
//! Holds every [`EntitySchema`] known to a [`crate::Dal`] and, computed once
//! at construction, the inbound relations of each type keyed by reverse
//! name. `Entity::reverse` consults this table instead of scanning all
//! declarations on every access.

use crate::error::{DalError, Result};
use crate::schema::EntitySchema;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A relation declared on `owner` that points at some target type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRelation {
    /// Declaring entity type
    pub owner: String,
    /// Relation name on the owner
    pub relation: String,
    /// Foreign-key column in the owner's table
    pub column: String,
}

/// Registered entity types and their reverse relations
#[derive(Debug, Default)]
pub struct EntityRegistry {
    schemas: BTreeMap<String, Arc<EntitySchema>>,
    inbound: BTreeMap<String, BTreeMap<String, InboundRelation>>,
}

impl EntityRegistry {
    /// Register a set of entity types.
    ///
    /// Fails when a type name or table is declared twice, when a relation
    /// targets an unregistered type, or when a reverse name collides with
    /// another reverse name or an attribute on the target.
    pub fn new<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = EntitySchema>,
    {
        let mut registry = Self::default();
        let mut tables = BTreeMap::new();
        for schema in schemas {
            if let Some(previous) = tables.insert(schema.table().to_string(), schema.name().to_string())
            {
                return Err(DalError::InvalidSchema(format!(
                    "{} and {} share table {}",
                    previous,
                    schema.name(),
                    schema.table()
                )));
            }
            if registry.schemas.contains_key(schema.name()) {
                return Err(DalError::InvalidSchema(format!(
                    "entity type {} registered twice",
                    schema.name()
                )));
            }
            registry
                .schemas
                .insert(schema.name().to_string(), Arc::new(schema));
        }

        for owner in registry.schemas.values() {
            for relation in owner.relations() {
                let target = registry.schemas.get(relation.target()).ok_or_else(|| {
                    DalError::InvalidRelation {
                        relation: format!("{}.{}", owner.name(), relation.name()),
                        reason: format!("target type {} is not registered", relation.target()),
                    }
                })?;
                if target.has_attribute(relation.reverse()) {
                    return Err(DalError::InvalidRelation {
                        relation: format!("{}.{}", owner.name(), relation.name()),
                        reason: format!(
                            "reverse name {} is already an attribute of {}",
                            relation.reverse(),
                            target.name()
                        ),
                    });
                }
                let slot = registry
                    .inbound
                    .entry(relation.target().to_string())
                    .or_default();
                if slot.contains_key(relation.reverse()) {
                    return Err(DalError::InvalidRelation {
                        relation: format!("{}.{}", owner.name(), relation.name()),
                        reason: format!(
                            "reverse name {} is already used on {}",
                            relation.reverse(),
                            relation.target()
                        ),
                    });
                }
                slot.insert(
                    relation.reverse().to_string(),
                    InboundRelation {
                        owner: owner.name().to_string(),
                        relation: relation.name().to_string(),
                        column: relation.column(),
                    },
                );
            }
        }

        Ok(registry)
    }

    /// Look up a registered type
    pub fn schema(&self, entity: &str) -> Result<&Arc<EntitySchema>> {
        self.schemas
            .get(entity)
            .ok_or_else(|| DalError::UnknownEntityType(entity.to_string()))
    }

    /// Registered type names, sorted
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// The relation reachable from `target` through `reverse`
    pub fn inbound(&self, target: &str, reverse: &str) -> Option<&InboundRelation> {
        self.inbound.get(target)?.get(reverse)
    }

    /// Reverse names available on `target`, sorted
    pub fn reverse_names(&self, target: &str) -> Vec<&str> {
        self.inbound
            .get(target)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
