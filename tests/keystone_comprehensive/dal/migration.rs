//! Schema Migration Tests
//!
//! Tests that tables are created on first use and extended additively when
//! an entity type gains properties or relations.

use crate::*;
use keystone::{Dal, DalError, EntityRegistry, SqliteConnector};

fn v1() -> Vec<EntitySchema> {
    vec![EntitySchema::builder("Machine")
        .property(Property::new("name", PropertyType::String).unique())
        .build()
        .unwrap()]
}

fn v2() -> Vec<EntitySchema> {
    vec![
        EntitySchema::builder("Machine")
            .property(Property::new("name", PropertyType::String).unique())
            .property(Property::new("ip", PropertyType::String))
            .property(Property::new("serial", PropertyType::String).optional().unique())
            .property(Property::new("roles", PropertyType::List).optional())
            .relation("rack", "Rack", "machines")
            .build()
            .unwrap(),
        EntitySchema::builder("Rack")
            .property(Property::new("label", PropertyType::String))
            .build()
            .unwrap(),
    ]
}

#[test]
fn test_additive_migration_keeps_old_rows() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let old_id = {
        let db = Keystone::builder()
            .path(dir.path())
            .entities(v1())
            .open()
            .unwrap();
        save_machine(&db, "old").id().unwrap()
    };

    let db = Keystone::builder()
        .path(dir.path())
        .entities(v2())
        .open()
        .unwrap();

    let old = db.dal.load("Machine", old_id).unwrap();
    assert_eq!(old.get("name").unwrap(), Value::from("old"));
    assert_eq!(old.get("ip").unwrap(), Value::Null);
    assert_eq!(old.get("roles").unwrap(), Value::Null);
    assert_eq!(old.relation_id("rack").unwrap(), None);

    let state = db.dal.ensure_table("Machine").unwrap();
    let columns: Vec<_> = state.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "name", "ip", "serial", "roles", "_rack_id"]);
}

#[test]
fn test_migrated_mandatory_column_is_checked_by_the_layer() {
    let connector = Arc::new(SqliteConnector::memory().unwrap());
    let old = Dal::new(connector.clone(), EntityRegistry::new(v1()).unwrap());
    let mut machine = old.create("Machine").unwrap();
    machine.set("name", "old").unwrap();
    machine.save().unwrap();

    let new = Dal::new(connector, EntityRegistry::new(v2()).unwrap());
    let mut loaded = new.load("Machine", machine.id().unwrap()).unwrap();
    assert!(new.ensure_table("Machine").unwrap().needs_mandatory_check("ip"));

    let err = loaded.save().unwrap_err();
    assert!(matches!(
        err,
        DalError::MissingMandatory { ref property, .. } if property == "ip"
    ));

    loaded.set("ip", "10.0.0.1").unwrap();
    loaded.save().unwrap();
    assert_eq!(
        new.load("Machine", machine.id().unwrap()).unwrap().get("ip").unwrap(),
        Value::from("10.0.0.1")
    );
}

#[test]
fn test_migrated_unique_column_is_enforced() {
    let connector = Arc::new(SqliteConnector::memory().unwrap());
    Dal::new(connector.clone(), EntityRegistry::new(v1()).unwrap())
        .ensure_table("Machine")
        .unwrap();

    let dal = Dal::new(connector, EntityRegistry::new(v2()).unwrap());
    let save = |name: &str, serial: &str| {
        let mut m = dal.create("Machine").unwrap();
        m.set("name", name).unwrap();
        m.set("ip", "10.0.0.1").unwrap();
        m.set("serial", serial).unwrap();
        m.save()
    };

    save("a", "SN1").unwrap();
    assert!(save("b", "SN1").unwrap_err().is_constraint());
}

#[test]
fn test_migration_is_idempotent_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..3 {
        let db = Keystone::builder()
            .path(dir.path())
            .entities(v2())
            .open()
            .unwrap();
        let columns = db.dal.ensure_table("Machine").unwrap().columns.len();
        assert_eq!(columns, 6);
    }
}

#[test]
fn test_relation_to_migrated_type() {
    let db = Keystone::builder().entities(v2()).open().unwrap();
    let mut rack = db.dal.create("Rack").unwrap();
    rack.set("label", "r1").unwrap();
    rack.save().unwrap();

    let mut machine = db.dal.create("Machine").unwrap();
    machine.set("name", "m").unwrap();
    machine.set("ip", "10.0.0.2").unwrap();
    machine.set_relation("rack", Some(&rack)).unwrap();
    machine.save().unwrap();

    assert_eq!(rack.reverse("machines").unwrap().len(), 1);
}
