#![allow(dead_code)]

use std::path::PathBuf;

use taipan_core::{
    geometry::ConeGeometry, models::FibreAssignment, positions, Database, DbConfig, Field,
    NewTile, ScienceTarget, Survey, SurveyBuilder, Target, TargetRole,
};
use tempfile::TempDir;

/// Helper function to create a migrated database in a temporary directory
pub fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open(temp_dir.path().join("test.db")).expect("Failed to open database");
    db.migrate().expect("Failed to migrate database");
    (temp_dir, db)
}

/// Helper function to create a test survey with small chunks and two workers
pub async fn create_test_survey() -> (TempDir, Survey) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path: PathBuf = temp_dir.path().join("survey.db");
    let survey = SurveyBuilder::new()
        .with_config(DbConfig {
            workers: 2,
            chunk_size: 2,
            ..DbConfig::default()
        })
        .with_database_path(Some(&db_path))
        .build()
        .await
        .expect("Failed to create survey");
    (temp_dir, survey)
}

pub fn science(target_id: i64, ra: f64, dec: f64, priority: i64) -> ScienceTarget {
    ScienceTarget::new(Target::new(target_id, ra, dec, TargetRole::Science), priority)
}

/// Field 1 at (10, -30) holding science targets A=101 (done), B=102 (on a
/// queued, unobserved tile) and C=103 (unassigned). Field 2 at (13, -30)
/// overlaps field 1; field 3 at (90, 10) is on its own with target 104.
pub fn seed_survey(db: &Database) {
    db.insert_fields(&[
        Field::new(1, 10.0, -30.0),
        Field::new(2, 13.0, -30.0),
        Field::new(3, 90.0, 10.0),
    ])
    .expect("Failed to insert fields");
    db.insert_science_targets(&[
        science(101, 10.1, -30.0, 3),
        science(102, 10.2, -30.1, 6),
        science(103, 9.9, -29.9, 8),
        science(104, 90.1, 10.0, 2),
    ])
    .expect("Failed to insert science targets");
    db.insert_targets(&[Target::new(201, 10.3, -30.2, TargetRole::Guide)])
        .expect("Failed to insert guide");

    let fields = db.read_active_fields().expect("Failed to read fields");
    let targets = db.read_targets(None, false).expect("Failed to read targets");
    positions::compute_target_positions(db, &ConeGeometry::default(), &fields, &targets)
        .expect("Failed to position targets");

    db.make_science_repeat_inc(&[101], true, true)
        .expect("Failed to complete target A");
    let tiles = db
        .insert_tiles(&[
            NewTile::new(1, vec![FibreAssignment::new(1, 102), FibreAssignment::new(2, 201)])
                .queued(),
            NewTile::new(3, vec![FibreAssignment::new(1, 104)]),
        ])
        .expect("Failed to insert tiles");
    assert_eq!(tiles.len(), 2);
}
