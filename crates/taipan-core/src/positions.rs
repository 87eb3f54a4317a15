//! Target-to-field membership (`target_posn`).
//!
//! Membership is derived data: which fields a target falls inside is decided
//! by a [`FieldGeometry`] and can be recomputed at any time.

use std::collections::HashSet;

use log::info;

use crate::{
    db::{Database, InsertOptions},
    error::Result,
    geometry::FieldGeometry,
    models::{Field, PositionReport, Target},
    query::{Expr, Value},
};

const DELETE_CHUNK: usize = 10_000;

/// Inserts a `target_posn` row for every (field, target) pair the geometry
/// places together. Existing rows are kept.
pub fn compute_target_positions(
    db: &Database,
    geometry: &dyn FieldGeometry,
    fields: &[Field],
    targets: &[Target],
) -> Result<PositionReport> {
    let rows: Vec<Vec<Value>> = fields
        .iter()
        .flat_map(|field| {
            targets
                .iter()
                .filter(move |target| geometry.contains(field, target))
                .map(move |target| vec![Value::Int(target.target_id), Value::Int(field.field_id)])
        })
        .collect();
    let rows_inserted = db.insert_many_rows(
        "target_posn",
        &["target_id", "field_id"],
        &rows,
        InsertOptions::skip_on_conflict(),
    )?;
    info!(
        "Positioned {} targets in {} fields: {} pairs, {rows_inserted} new",
        targets.len(),
        fields.len(),
        rows.len()
    );
    Ok(PositionReport {
        fields: fields.len(),
        targets: targets.len(),
        rows_inserted,
    })
}

/// Membership for the given active fields against every active target.
pub fn position_fields(
    db: &Database,
    geometry: &dyn FieldGeometry,
    field_ids: &[i64],
) -> Result<PositionReport> {
    let fields: Vec<Field> = db
        .read_fields_by_id(field_ids)?
        .into_iter()
        .filter(|f| f.is_active)
        .collect();
    let targets = db.read_targets(None, false)?;
    compute_target_positions(db, geometry, &fields, &targets)
}

/// Drops and recomputes the membership of the given targets, for example
/// after their positions changed.
pub fn refresh_target_positions(
    db: &Database,
    geometry: &dyn FieldGeometry,
    target_ids: &[i64],
) -> Result<PositionReport> {
    db.with_transaction(|db| {
        for chunk in target_ids.chunks(DELETE_CHUNK) {
            db.delete_rows(
                "target_posn",
                Some(&Expr::in_list("target_id", chunk.iter().copied())),
            )?;
        }
        let wanted: HashSet<i64> = target_ids.iter().copied().collect();
        let targets: Vec<Target> = db
            .read_targets(None, false)?
            .into_iter()
            .filter(|t| wanted.contains(&t.target_id))
            .collect();
        let fields = db.read_active_fields()?;
        compute_target_positions(db, geometry, &fields, &targets)
    })
}
