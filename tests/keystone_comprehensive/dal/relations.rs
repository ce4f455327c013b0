//! Relation Tests
//!
//! Tests for lazy many-to-one relations, reverse (one-to-many) access and
//! self-relations.

use crate::*;
use keystone::DalError;

// =============================================================================
// FORWARD RELATIONS
// =============================================================================

#[test]
fn test_relation_id_round_trip() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    let disk = save_disk(&db, "s1", Some(&machine));

    let loaded = db.dal.load("Disk", disk.id().unwrap()).unwrap();
    assert_eq!(loaded.relation_id("machine").unwrap(), machine.id());
    assert_eq!(
        loaded.get("machine_id").unwrap(),
        Value::Int(machine.id().unwrap())
    );
}

#[test]
fn test_relation_resolves_lazily_once() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    let disk = save_disk(&db, "s1", Some(&machine));

    let mut loaded = db.dal.load("Disk", disk.id().unwrap()).unwrap();
    assert!(!loaded.relation_cell("machine").unwrap().is_resolved());

    // Rename the machine after the disk was loaded but before resolution.
    let mut renamed = db.dal.load("Machine", machine.id().unwrap()).unwrap();
    renamed.set("name", "m1-renamed").unwrap();
    renamed.save().unwrap();

    let first = loaded.related("machine").unwrap().unwrap().get("name").unwrap();
    assert_eq!(first, Value::from("m1-renamed"));
    assert!(loaded.relation_cell("machine").unwrap().is_resolved());

    // Cached: later storage changes are not observed through the cell.
    renamed.set("name", "m1-again").unwrap();
    renamed.save().unwrap();
    let second = loaded.related("machine").unwrap().unwrap().get("name").unwrap();
    assert_eq!(second, Value::from("m1-renamed"));
}

#[test]
fn test_clearing_a_relation() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    let mut disk = save_disk(&db, "s1", Some(&machine));

    disk.set_relation("machine", None).unwrap();
    disk.save().unwrap();

    let mut loaded = db.dal.load("Disk", disk.id().unwrap()).unwrap();
    assert_eq!(loaded.relation_id("machine").unwrap(), None);
    assert!(loaded.related("machine").unwrap().is_none());
    assert!(machine.reverse("disks").unwrap().is_empty());
}

#[test]
fn test_relation_requires_saved_target_of_declared_type() {
    let db = create_db();
    let mut disk = db.dal.create("Disk").unwrap();

    let unsaved = db.dal.create("Machine").unwrap();
    assert!(matches!(
        disk.set_relation("machine", Some(&unsaved)),
        Err(DalError::NotPersisted { .. })
    ));

    let node = {
        let mut n = db.dal.create("Node").unwrap();
        n.set("label", "root").unwrap();
        n.save().unwrap();
        n
    };
    assert!(matches!(
        disk.set_relation("machine", Some(&node)),
        Err(DalError::InvalidRelation { .. })
    ));
    assert!(matches!(
        disk.set_relation("owner", Some(&node)),
        Err(DalError::UnknownAttribute { .. })
    ));
}

#[test]
fn test_dangling_foreign_id_fails_on_resolution() {
    let db = create_db();
    let mut machine = save_machine(&db, "m1");
    let disk = save_disk(&db, "s1", Some(&machine));
    machine.delete().unwrap();

    let mut loaded = db.dal.load("Disk", disk.id().unwrap()).unwrap();
    assert_eq!(loaded.relation_id("machine").unwrap(), machine.id());
    assert!(loaded.related("machine").unwrap_err().is_not_found());
}

// =============================================================================
// REVERSE RELATIONS
// =============================================================================

#[test]
fn test_reverse_returns_every_owner() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    let other = save_machine(&db, "m2");

    let n = 5;
    for i in 0..n {
        save_disk(&db, &format!("s{}", i), Some(&machine));
    }
    save_disk(&db, "elsewhere", Some(&other));
    save_disk(&db, "loose", None);

    let disks = machine.reverse("disks").unwrap();
    assert_eq!(disks.len(), n);
    assert!(disks
        .iter()
        .all(|d| d.relation_id("machine").unwrap() == machine.id()));
    assert!(disks.windows(2).all(|w| w[0].id() < w[1].id()));
}

#[test]
fn test_reverse_is_not_cached() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    assert_eq!(machine.reverse("disks").unwrap().len(), 0);

    let mut disk = save_disk(&db, "s1", Some(&machine));
    assert_eq!(machine.reverse("disks").unwrap().len(), 1);

    disk.delete().unwrap();
    assert_eq!(machine.reverse("disks").unwrap().len(), 0);
}

#[test]
fn test_reverse_requires_persisted_entity() {
    let db = create_db();
    let machine = db.dal.create("Machine").unwrap();
    assert!(matches!(
        machine.reverse("disks"),
        Err(DalError::NotPersisted { .. })
    ));
    assert!(matches!(
        save_machine(&db, "m").reverse("nics"),
        Err(DalError::UnknownAttribute { .. })
    ));
}

#[test]
fn test_find_by_relation_id() {
    let db = create_db();
    let machine = save_machine(&db, "m1");
    save_disk(&db, "s1", Some(&machine));
    save_disk(&db, "s2", None);

    let attached = db
        .dal
        .find("Disk", "machine_id", machine.id().unwrap())
        .unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(db.dal.find("Disk", "machine_id", Value::Null).unwrap().len(), 1);
}

// =============================================================================
// SELF-RELATIONS
// =============================================================================

#[test]
fn test_self_relation_tree() {
    let db = create_db();
    let mut root = db.dal.create("Node").unwrap();
    root.set("label", "root").unwrap();
    root.save().unwrap();

    for label in ["left", "right"] {
        let mut child = db.dal.create("Node").unwrap();
        child.set("label", label).unwrap();
        child.set_relation("parent", Some(&root)).unwrap();
        child.save().unwrap();
    }

    let children = root.reverse("children").unwrap();
    let labels: Vec<_> = children.iter().map(|c| c.get("label").unwrap()).collect();
    assert_eq!(labels, vec![Value::from("left"), Value::from("right")]);

    let mut left = children[0].clone();
    let parent = left.related("parent").unwrap().unwrap();
    assert_eq!(parent.id(), root.id());
    assert!(root.relation_id("parent").unwrap().is_none());
}
