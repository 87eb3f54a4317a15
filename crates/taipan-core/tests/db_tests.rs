mod common;

use std::{thread, time::Duration};

use common::{create_test_db, science, seed_survey};
use taipan_core::{
    assemble::assemble_tiles,
    geometry::ConeGeometry,
    models::FibreAssignment,
    query::{from_descriptors, Combinator, Descriptor},
    reconcile::reconcile_fields,
    Database, Expr, Field, InsertOptions, NewTile, ReconcileOptions, Select, Value,
};

fn field_row(field_id: i64) -> Vec<Value> {
    let field = Field::new(field_id, (field_id % 360) as f64, -30.0);
    vec![
        field.field_id.into(),
        field.ra.into(),
        field.dec.into(),
        field.ux.into(),
        field.uy.into(),
        field.uz.into(),
        true.into(),
    ]
}

#[test]
fn test_migrations_recorded_once() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.migrate().expect("Failed to re-run migrations").is_empty());
    let versions: Vec<String> = db
        .applied_versions()
        .expect("Failed to read versions")
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec!["0.0.1", "0.0.2", "0.0.3"]);
}

#[test]
fn test_batched_insert_has_no_gaps_or_duplicates() {
    let (_temp_dir, db) = create_test_db();
    let rows: Vec<Vec<Value>> = (1..=250).map(field_row).collect();

    let inserted = db
        .insert_many_rows(
            "field",
            &["field_id", "ra", "dec", "ux", "uy", "uz", "is_active"],
            &rows,
            InsertOptions::default().with_batch_size(7),
        )
        .expect("Failed to insert fields");
    assert_eq!(inserted, 250);

    let ids = db.field_ids().expect("Failed to read field ids");
    assert_eq!(ids, (1..=250).collect::<Vec<i64>>());
}

#[test]
fn test_descriptor_filter_matches_both_predicates() {
    let (_temp_dir, db) = create_test_db();
    seed_survey(&db);
    db.set_targets_active(&[103], false)
        .expect("Failed to deactivate target");

    let filter = from_descriptors(
        &[
            Descriptor::new("priority", ">", 5),
            Descriptor::new("is_active", "=", true),
        ],
        &[Combinator::And],
    )
    .expect("Failed to parse descriptors");
    let filtered: Vec<i64> = db
        .read_science_targets(Some(filter))
        .expect("Failed to read targets")
        .iter()
        .map(|t| t.target_id())
        .collect();

    let expected: Vec<i64> = db
        .read_science_targets(None)
        .expect("Failed to read targets")
        .iter()
        .filter(|t| t.priority > 5 && t.target.is_active)
        .map(|t| t.target_id())
        .collect();
    assert_eq!(filtered, expected);
    assert_eq!(filtered, vec![102]);
}

#[test]
fn test_temp_table_update_matches_inline_update() {
    let (_dir_a, inline) = create_test_db();
    let (_dir_b, staged) = create_test_db();
    seed_survey(&inline);
    seed_survey(&staged);

    let columns = ["target_id", "priority"];
    let rows = vec![
        vec![Value::Int(101), Value::Int(9)],
        vec![Value::Int(102), Value::Int(1)],
        vec![Value::Int(104), Value::Int(7)],
    ];
    let pending = Expr::is_null("done");

    let a = inline
        .update_rows("science_target", &columns, &rows, 1, Some(&pending))
        .expect("Inline update failed");
    let b = staged
        .update_rows_via_temp_table("science_target", &columns, &rows, 1, Some(&pending))
        .expect("Temp-table update failed");
    assert_eq!(a, 2);
    assert_eq!(a, b);

    let snapshot = |db: &Database| {
        db.select(
            "science_target",
            &Select::new()
                .columns(["target_id", "priority", "visits", "repeats"])
                .order_by("target_id"),
        )
        .expect("Failed to select")
        .into_rows()
    };
    assert_eq!(snapshot(&inline), snapshot(&staged));
}

#[test]
fn test_next_tile_id_follows_field_maximum() {
    let (_temp_dir, db) = create_test_db();
    db.insert_fields(&[Field::new(7, 10.0, -30.0)])
        .expect("Failed to insert field");
    let existing = db
        .insert_tiles(&vec![NewTile::new(7, vec![]); 4])
        .expect("Failed to insert tiles");
    assert_eq!(existing.last().map(|t| t.tile_id), Some(4));

    let tile = db
        .insert_tiles(&[NewTile::new(7, vec![FibreAssignment::new(1, -1)])])
        .expect("Failed to insert tile")
        .remove(0);
    assert_eq!(tile.tile_id, 5);
    assert_eq!(tile.field_id, 7);
    assert!(existing.iter().all(|t| t.tile_pk != tile.tile_pk));
}

#[test]
fn test_done_timestamp_is_written_once() {
    let (_temp_dir, db) = create_test_db();
    seed_survey(&db);
    let done = |db: &Database| {
        db.read_science_targets(Some(Expr::eq("target_id", 101)))
            .expect("Failed to read target")[0]
            .clone()
    };
    let first = done(&db);
    assert!(first.done.is_some());

    thread::sleep(Duration::from_millis(20));
    db.make_science_repeat_inc(&[101], true, false)
        .expect("Failed to repeat target");

    let second = done(&db);
    assert_eq!(second.done, first.done);
    assert_eq!(second.repeats, first.repeats + 1);
}

#[test]
fn test_dry_run_touches_nothing() {
    let db = Database::dry_run();

    assert!(db.read_fields(None).expect("read_fields").is_empty());
    assert!(db.read_science_targets(None).expect("read_science_targets").is_empty());
    assert_eq!(db.insert_fields(&[Field::new(1, 0.0, 0.0)]).expect("insert_fields"), 0);
    assert_eq!(
        db.insert_science_targets(&[science(1, 0.0, 0.0, 1)])
            .expect("insert_science_targets"),
        0
    );
    assert_eq!(db.set_fields_active(&[1], false).expect("set_fields_active"), 0);
    assert_eq!(
        db.make_science_repeat_inc(&[1], true, true)
            .expect("make_science_repeat_inc"),
        0
    );
    assert!(db
        .insert_tiles(&[NewTile::new(1, vec![FibreAssignment::new(1, 1)])])
        .expect("insert_tiles")
        .is_empty());
    assert!(assemble_tiles(&db, None).expect("assemble_tiles").is_empty());
    assert_eq!(db.survey_summary().expect("survey_summary").tiles, 0);

    let report = reconcile_fields(
        &db,
        &ConeGeometry::default(),
        Some(&[1, 2]),
        &ReconcileOptions::default(),
    )
    .expect("reconcile_fields");
    assert_eq!(report.rows_updated, 0);

    assert!(!db.statements().is_empty());
}
