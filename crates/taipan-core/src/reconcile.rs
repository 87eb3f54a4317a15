//! Per-field science-target counters on `tiling_info`.
//!
//! For every field the positioned science targets are split into complete
//! (`done` set) and incomplete ones. Each field's tiles then carry:
//!
//! - `n_sci_obs`: complete targets
//! - `n_sci_rem`: all incomplete targets, allocated or not
//! - `n_sci_alloc`: incomplete targets sitting on a tile that has not been
//!   observed yet, so always at most `n_sci_rem`
//! - `n_done`: targets flagged successful
//!
//! A target positioned in several fields counts once in each of them, which
//! is why a partial pass first widens the requested fields to every field
//! overlapping them. Work is split into field chunks; each chunk is computed
//! and written in its own transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::DEFAULT_CHUNK_SIZE,
    db::{Database, Select},
    error::{Result, TaipanError},
    geometry::FieldGeometry,
    models::{FieldCounters, ReconcileReport},
    query::{Expr, Value},
};

const COUNTER_COLUMNS: [&str; 4] = ["n_sci_obs", "n_sci_alloc", "n_sci_rem", "n_done"];

/// Knobs for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Widen a partial field list to every overlapping field.
    pub expand_overlaps: bool,
    /// Only write rows of tiles that are neither queued nor observed.
    pub unobserved_only: bool,
    /// Fields per chunk.
    pub chunk_size: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            expand_overlaps: true,
            unobserved_only: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Field IDs a pass must cover, sorted.
///
/// `None` means every field. Requested IDs missing from the database are
/// rejected before anything else happens. Dry-run databases hold no rows to
/// check or expand against, so the request is returned as given.
pub fn resolve_fields(
    db: &Database,
    geometry: &dyn FieldGeometry,
    field_ids: Option<&[i64]>,
    expand_overlaps: bool,
) -> Result<Vec<i64>> {
    let Some(requested) = field_ids else {
        return db.field_ids();
    };
    let mut requested: Vec<i64> = requested.to_vec();
    requested.sort_unstable();
    requested.dedup();
    if db.is_dry_run() || requested.is_empty() {
        return Ok(requested);
    }

    let fields = db.read_fields(None)?;
    let known: HashSet<i64> = fields.iter().map(|f| f.field_id).collect();
    let missing: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|id| !known.contains(id))
        .collect();
    if !missing.is_empty() {
        return Err(TaipanError::UnknownField { ids: missing });
    }
    if !expand_overlaps {
        return Ok(requested);
    }

    let wanted: HashSet<i64> = requested.iter().copied().collect();
    let seeds: Vec<_> = fields
        .iter()
        .filter(|f| wanted.contains(&f.field_id))
        .collect();
    let resolved: Vec<i64> = fields
        .iter()
        .filter(|f| wanted.contains(&f.field_id) || seeds.iter().any(|s| geometry.overlaps(s, f)))
        .map(|f| f.field_id)
        .collect();
    debug!(
        "Expanded {} requested fields to {} overlapping fields",
        requested.len(),
        resolved.len()
    );
    Ok(resolved)
}

/// `(tile_pk, field_id)` of tiles in `field_ids` that are neither queued
/// nor observed.
pub fn tile_allow_list(db: &Database, field_ids: &[i64]) -> Result<Vec<(i64, i64)>> {
    let table = db.select_joined_in(
        &["tile"],
        "field_id",
        field_ids,
        &Select::new()
            .columns(["tile_pk", "field_id"])
            .filter(Expr::eq("is_observed", false).and(Expr::eq("is_queued", false))),
    )?;
    table
        .records()
        .map(|r| Ok((r.i64("tile_pk")?, r.i64("field_id")?)))
        .collect()
}

/// Counters for each of `field_ids`, zero for fields without targets.
pub fn count_field_targets(db: &Database, field_ids: &[i64]) -> Result<Vec<FieldCounters>> {
    let positioned = db.select_joined_in(
        &["science_target", "target_posn"],
        "field_id",
        field_ids,
        &Select::new().columns(["target_id", "field_id", "done", "success"]),
    )?;

    let mut incomplete = Vec::new();
    for record in positioned.records() {
        if record.get("done")?.is_null() {
            incomplete.push(record.i64("target_id")?);
        }
    }
    incomplete.sort_unstable();
    incomplete.dedup();

    let allocated: HashSet<i64> = db
        .select_joined_in(
            &["target_field", "tile"],
            "target_id",
            &incomplete,
            &Select::new()
                .columns(["target_id"])
                .distinct()
                .filter(Expr::eq("is_observed", false)),
        )?
        .i64s("target_id")?
        .into_iter()
        .collect();

    let mut counters: BTreeMap<i64, FieldCounters> = field_ids
        .iter()
        .map(|id| (*id, FieldCounters::new(*id)))
        .collect();
    for record in positioned.records() {
        let field_id = record.i64("field_id")?;
        let Some(counter) = counters.get_mut(&field_id) else {
            continue;
        };
        if record.get("done")?.is_null() {
            counter.n_sci_rem += 1;
            if allocated.contains(&record.i64("target_id")?) {
                counter.n_sci_alloc += 1;
            }
        } else {
            counter.n_sci_obs += 1;
        }
        if record.bool("success")? {
            counter.n_done += 1;
        }
    }
    Ok(counters.into_values().collect())
}

fn counter_value(counters: &FieldCounters, column: &str) -> i64 {
    match column {
        "n_sci_obs" => counters.n_sci_obs,
        "n_sci_alloc" => counters.n_sci_alloc,
        "n_sci_rem" => counters.n_sci_rem,
        _ => counters.n_done,
    }
}

fn counter_row(key: i64, counters: &FieldCounters, columns: &[&str]) -> Vec<Value> {
    std::iter::once(Value::Int(key))
        .chain(columns.iter().map(|column| Value::Int(counter_value(counters, column))))
        .collect()
}

/// Writes counters to `tiling_info`.
///
/// Every counter of a field is written, zeros included. A field without any
/// positioned science target is left out, so its stored values stand. With an
/// allow-list, only the listed tiles are written.
pub fn write_counters(
    db: &Database,
    counters: &[FieldCounters],
    allow_list: Option<&[(i64, i64)]>,
) -> Result<usize> {
    let counters: Vec<&FieldCounters> = counters.iter().filter(|c| c.positioned() > 0).collect();
    if counters.is_empty() {
        debug!("No positioned science targets, nothing written");
        return Ok(0);
    }
    let columns = COUNTER_COLUMNS;

    let (key, rows): (&str, Vec<Vec<Value>>) = match allow_list {
        None => (
            "field_id",
            counters
                .iter()
                .map(|c| counter_row(c.field_id, c, &columns))
                .collect(),
        ),
        Some(tiles) => {
            let by_field: HashMap<i64, &FieldCounters> =
                counters.iter().map(|c| (c.field_id, *c)).collect();
            (
                "tile_pk",
                tiles
                    .iter()
                    .filter_map(|(tile_pk, field_id)| {
                        by_field
                            .get(field_id)
                            .map(|c| counter_row(*tile_pk, c, &columns))
                    })
                    .collect(),
            )
        }
    };

    let mut update_columns = vec![key];
    update_columns.extend(&columns);
    db.bulk_update("tiling_info", &update_columns, &rows, 1, None)
}

/// Recomputes and writes one chunk of fields in a single transaction.
pub fn reconcile_chunk(
    db: &Database,
    field_ids: &[i64],
    unobserved_only: bool,
) -> Result<ReconcileReport> {
    db.with_transaction(|db| {
        let allow_list = if unobserved_only {
            let tiles = tile_allow_list(db, field_ids)?;
            if tiles.is_empty() {
                debug!("No eligible tiles among {} fields", field_ids.len());
                return Ok(ReconcileReport {
                    chunks: 1,
                    ..ReconcileReport::default()
                });
            }
            Some(tiles)
        } else {
            None
        };

        let counters = count_field_targets(db, field_ids)?;
        let rows_updated = write_counters(db, &counters, allow_list.as_deref())?;
        info!(
            "Reconciled {} fields, {rows_updated} tiling_info rows updated",
            field_ids.len()
        );
        Ok(ReconcileReport {
            chunks: 1,
            rows_updated,
            ..ReconcileReport::default()
        })
    })
}

/// Resolves the field set and checks the allow-list; `None` when there is
/// nothing eligible to update.
pub(crate) fn plan_fields(
    db: &Database,
    geometry: &dyn FieldGeometry,
    field_ids: Option<&[i64]>,
    options: &ReconcileOptions,
) -> Result<Option<Vec<i64>>> {
    if options.chunk_size == 0 {
        return Err(TaipanError::invalid_input("chunk_size").with_reason("must be at least 1"));
    }
    let resolved = resolve_fields(db, geometry, field_ids, options.expand_overlaps)?;
    if options.unobserved_only && !db.is_dry_run() && tile_allow_list(db, &resolved)?.is_empty() {
        warn!(
            "No unqueued, unobserved tiles among {} fields; nothing to reconcile",
            resolved.len()
        );
        return Ok(None);
    }
    Ok(Some(resolved))
}

/// Runs a full pass on one connection, chunk after chunk.
///
/// Each chunk commits on its own, so a failure leaves earlier chunks
/// written and stops the pass.
pub fn reconcile_fields(
    db: &Database,
    geometry: &dyn FieldGeometry,
    field_ids: Option<&[i64]>,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport {
        requested: field_ids.map(<[i64]>::to_vec).unwrap_or_default(),
        ..ReconcileReport::default()
    };
    let Some(resolved) = plan_fields(db, geometry, field_ids, options)? else {
        report.skipped = true;
        return Ok(report);
    };
    report.resolved = resolved.len();
    for chunk in resolved.chunks(options.chunk_size) {
        report.merge(&reconcile_chunk(db, chunk, options.unobserved_only)?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::InsertOptions,
        geometry::ConeGeometry,
        models::{FibreAssignment, Field, NewTile, ScienceTarget, Target, TargetRole},
    };

    fn survey() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.insert_fields(&[
            Field::new(1, 10.0, -30.0),
            Field::new(2, 13.0, -30.0),
            Field::new(3, 90.0, 10.0),
        ])
        .unwrap();
        db
    }

    #[test]
    fn test_unknown_field_rejected() {
        let db = survey();
        let err = resolve_fields(&db, &ConeGeometry::default(), Some(&[1, 42]), true).unwrap_err();
        assert!(matches!(err, TaipanError::UnknownField { ref ids } if ids == &[42]));
    }

    #[test]
    fn test_overlap_expansion() {
        let db = survey();
        let geometry = ConeGeometry::default();
        assert_eq!(resolve_fields(&db, &geometry, Some(&[1]), true).unwrap(), vec![1, 2]);
        assert_eq!(resolve_fields(&db, &geometry, Some(&[1]), false).unwrap(), vec![1]);
        assert_eq!(resolve_fields(&db, &geometry, None, true).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_allow_list_skips() {
        let db = survey();
        let options = ReconcileOptions {
            unobserved_only: true,
            ..ReconcileOptions::default()
        };
        let report = reconcile_fields(&db, &ConeGeometry::default(), None, &options).unwrap();
        assert!(report.skipped);
        assert_eq!(report.rows_updated, 0);
    }

    #[test]
    fn test_counts_for_shared_target() {
        let db = survey();
        db.insert_science_targets(&[ScienceTarget::new(
            Target::new(10, 11.5, -30.0, TargetRole::Science),
            1,
        )])
        .unwrap();
        db.insert_many_rows(
            "target_posn",
            &["target_id", "field_id"],
            &[vec![10.into(), 1.into()], vec![10.into(), 2.into()]],
            InsertOptions::default(),
        )
        .unwrap();
        db.insert_tiles(&[NewTile::new(1, vec![FibreAssignment::new(1, 10)])])
            .unwrap();

        let counters = count_field_targets(&db, &[1, 2, 3]).unwrap();
        assert_eq!(counters[0].n_sci_rem, 1);
        assert_eq!(counters[0].n_sci_alloc, 1);
        assert_eq!(counters[1].n_sci_alloc, 1);
        assert_eq!(counters[2], FieldCounters::new(3));
    }

    #[test]
    fn test_dry_run_pass() {
        let db = Database::dry_run();
        let report = reconcile_fields(
            &db,
            &ConeGeometry::default(),
            Some(&[5, 6]),
            &ReconcileOptions::default(),
        )
        .unwrap();
        assert_eq!(report.resolved, 2);
        assert_eq!(report.rows_updated, 0);
        assert!(!db.statements().is_empty());
    }
}
