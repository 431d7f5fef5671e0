/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use platterdb::constants::RESERVED_BLOCKS;
use platterdb::engine::EngineError;
use platterdb::relation::CompareOp;

mod common;

use common::{emp_fields, note_fields, setup, values};

#[test]
fn test_create_insert_scan_in_order() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();
    engine
        .insert_values("emp", &values(&["0002", "Bob", "25"]))
        .unwrap();

    let rows = engine.scan_relation("emp").unwrap();
    assert_eq!(
        rows,
        vec![
            values(&["0001", "Alice", "30"]),
            values(&["0002", "Bob", "25"]),
        ]
    );
}

#[test]
fn test_primary_key_probe_uses_index() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();
    let (block, slot) = engine
        .insert_values("emp", &values(&["0002", "Bob", "25"]))
        .unwrap();

    // The index resolves the key to exactly the slot the insert reported.
    let index = engine.index("emp").expect("fixed relation has an index");
    assert_eq!(index.search("0002"), vec![(block, slot)]);

    engine
        .select_where("emp", "id", CompareOp::Eq, "0002", "probe_out")
        .unwrap();
    let rows = engine.scan_relation("probe_out").unwrap();
    assert_eq!(rows, vec![values(&["0002", "Bob", "25"])]);
}

#[test]
fn test_delete_then_insert_reuses_freed_slot() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    for (id, name, age) in [("0001", "Alice", "30"), ("0002", "Bob", "25"), ("0003", "Eve", "41")] {
        engine.insert_values("emp", &values(&[id, name, age])).unwrap();
    }

    let deleted = engine
        .delete_where("emp", "id", CompareOp::Eq, "0002")
        .unwrap();
    assert_eq!(deleted, 1);

    // The new record takes the slot the deleted one vacated.
    let (_, slot) = engine
        .insert_values("emp", &values(&["0004", "Mallory", "29"]))
        .unwrap();
    assert_eq!(slot, 1);

    let rows = engine.scan_relation("emp").unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.contains(&values(&["0004", "Mallory", "29"])));
    assert!(!rows.iter().any(|row| row[0] == "0002"));

    // The index forgot the deleted key and learned the new one.
    let index = engine.index("emp").unwrap();
    assert!(index.search("0002").is_empty());
    assert_eq!(index.search("0004").len(), 1);
}

#[test]
fn test_select_where_materializes_output() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    for (id, name, age) in [("0001", "Alice", "30"), ("0002", "Bob", "25"), ("0003", "Eve", "41")] {
        engine.insert_values("emp", &values(&[id, name, age])).unwrap();
    }

    let count = engine
        .select_where("emp", "age", CompareOp::Ge, "30", "seniors")
        .unwrap();
    assert_eq!(count, 2);

    let rows = engine.scan_relation("seniors").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&values(&["0001", "Alice", "30"])));
    assert!(rows.contains(&values(&["0003", "Eve", "41"])));

    // The source is untouched.
    assert_eq!(engine.scan_relation("emp").unwrap().len(), 3);
}

#[test]
fn test_select_where_skips_unparseable_rows() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();
    // An age that does not parse as an int is skipped, not an error.
    engine
        .insert_values("emp", &values(&["0002", "Bob", "xx"]))
        .unwrap();

    let count = engine
        .select_where("emp", "age", CompareOp::Ge, "0", "out")
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_variable_relation_insert_delete_modify() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("notes", false, note_fields()).unwrap();
    engine
        .insert_values("notes", &values(&["1", "first note"]))
        .unwrap();
    engine
        .insert_values("notes", &values(&["2", "a considerably longer second note"]))
        .unwrap();
    engine
        .insert_values("notes", &values(&["3", "third"]))
        .unwrap();

    let deleted = engine
        .delete_where("notes", "id", CompareOp::Eq, "2")
        .unwrap();
    assert_eq!(deleted, 1);

    // Compaction kept the surviving records in order.
    let rows = engine.scan_relation("notes").unwrap();
    assert_eq!(
        rows,
        vec![values(&["1", "first note"]), values(&["3", "third"])]
    );

    let changed = engine
        .modify("notes", "id", "3", &values(&["3", "third, revised"]))
        .unwrap();
    assert_eq!(changed, 1);
    let rows = engine.scan_relation("notes").unwrap();
    assert!(rows.contains(&values(&["3", "third, revised"])));
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_variable_relation_grows_into_new_blocks() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("notes", false, note_fields()).unwrap();
    // 256-byte blocks fill up quickly with 60-byte bodies.
    for i in 0..12 {
        engine
            .insert_values("notes", &values(&[&i.to_string(), &"x".repeat(60)]))
            .unwrap();
    }

    let blocks = engine.catalog().get("notes").unwrap().blocks.len();
    assert!(blocks > 1, "expected the relation to outgrow one block");
    assert_eq!(engine.scan_relation("notes").unwrap().len(), 12);
}

#[test]
fn test_modify_fixed_in_place_and_index_maintenance() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    let location = engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();

    // Non-key update rewrites in place.
    engine
        .modify("emp", "id", "0001", &values(&["0001", "Alicia", "31"]))
        .unwrap();
    assert_eq!(
        engine.scan_relation("emp").unwrap(),
        vec![values(&["0001", "Alicia", "31"])]
    );
    assert_eq!(engine.index("emp").unwrap().search("0001"), vec![location]);

    // Key update moves the index entry.
    engine
        .modify("emp", "id", "0001", &values(&["0009", "Alicia", "31"]))
        .unwrap();
    let index = engine.index("emp").unwrap();
    assert!(index.search("0001").is_empty());
    assert_eq!(index.search("0009"), vec![location]);

    let rows = engine.scan_relation("emp").unwrap();
    assert_eq!(rows, vec![values(&["0009", "Alicia", "31"])]);
}

#[test]
fn test_index_survives_many_inserts() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    // Enough keys to split buckets several times (capacity 20 at this
    // block size).
    for i in 0..50 {
        engine
            .insert_values("emp", &values(&[&format!("{i:04}"), "worker", "20"]))
            .unwrap();
    }

    for i in [0, 7, 23, 49] {
        let key = format!("{i:04}");
        let count = engine
            .select_where("emp", "id", CompareOp::Eq, &key, "out")
            .unwrap();
        assert_eq!(count, 1, "key {key} not found through the index");
    }
    assert!(engine.index("emp").unwrap().global_depth() >= 2);
}

#[test]
fn test_drop_relation_releases_blocks() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    let free_before = engine.bitmap().free_blocks();
    engine.create_relation("emp", true, emp_fields()).unwrap();
    for i in 0..40 {
        engine
            .insert_values("emp", &values(&[&format!("{i:04}"), "worker", "20"]))
            .unwrap();
    }
    assert!(engine.bitmap().free_blocks() < free_before);

    assert!(engine.drop_relation("emp").unwrap());
    assert_eq!(engine.bitmap().free_blocks(), free_before);
    assert!(!engine.catalog().has("emp"));
    assert!(engine.index("emp").is_none());

    // Dropping again is a logged no-op.
    assert!(!engine.drop_relation("emp").unwrap());
}

#[test]
fn test_create_replaces_existing_relation() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();

    engine.create_relation("emp", true, emp_fields()).unwrap();
    assert!(engine.scan_relation("emp").unwrap().is_empty());
}

#[test]
fn test_unknown_names_error() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    assert!(matches!(
        engine.insert_values("ghost", &values(&["1"])),
        Err(EngineError::UnknownRelation(_))
    ));

    engine.create_relation("emp", true, emp_fields()).unwrap();
    assert!(matches!(
        engine.delete_where("emp", "salary", CompareOp::Eq, "1"),
        Err(EngineError::UnknownField { .. })
    ));
}

#[test]
fn test_oversized_value_rejected_on_insert() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    let err = engine
        .insert_values("emp", &values(&["00001", "Alice", "30"]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Record(_)));
    assert!(engine.scan_relation("emp").unwrap().is_empty());
}

#[test]
fn test_fixed_relation_spills_into_second_block() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    // Record size 14, capacity (256 - 16) / 14 = 17 per block.
    for i in 0..20 {
        engine
            .insert_values("emp", &values(&[&format!("{i:04}"), "worker", "20"]))
            .unwrap();
    }

    let rel = engine.catalog().get("emp").unwrap();
    assert_eq!(rel.blocks.len(), 2);
    assert_eq!(engine.scan_relation("emp").unwrap().len(), 20);

    let usage = engine.relation_block_info("emp").unwrap();
    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].used_bytes, 16 + 17 * 14);
    assert_eq!(usage[1].used_bytes, 16 + 3 * 14);
}

#[test]
fn test_first_data_block_follows_reserved_range() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    let rel = engine.catalog().get("emp").unwrap();
    assert_eq!(rel.blocks, vec![RESERVED_BLOCKS]);
}

#[test]
fn test_disk_capacity_accounting() {
    let mut ctx = setup();
    let engine = &mut ctx.engine;

    engine.create_relation("emp", true, emp_fields()).unwrap();
    engine
        .insert_values("emp", &values(&["0001", "Alice", "30"]))
        .unwrap();

    let report = engine.disk_capacity().unwrap();
    assert_eq!(report.total_blocks, 64);
    assert_eq!(report.block_size, 256);
    // Data block + index header + two buckets + two reserved blocks.
    assert_eq!(report.used_blocks, 6);
    assert_eq!(report.data_blocks, 1);
    assert_eq!(report.data_bytes, 16 + 14);
}
