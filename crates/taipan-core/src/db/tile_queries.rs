//! Tile lifecycle: configuration, queueing, observation and deletion.

use jiff::Timestamp;
use log::{debug, info};

use super::{Aggregate, Assignment, InsertOptions, Select};
use crate::{
    error::{Result, TaipanError},
    models::{
        NewTile, ObservingLogEntry, SurveySummary, Tile, TilingConfig, TilingInfo, SKY_TARGET_ID,
    },
    query::{Expr, Value},
};

const TILE_COLUMNS: [&str; 5] = ["tile_pk", "tile_id", "field_id", "is_queued", "is_observed"];
const TILING_INFO_COLUMNS: [&str; 9] = [
    "tile_pk",
    "field_id",
    "diff_sum",
    "prior_sum",
    "cw_sum",
    "n_sci",
    "n_std",
    "n_guide",
    "n_sky",
];
const TILING_CONFIG_COLUMNS: [&str; 4] = ["tile_pk", "date_config", "hrs_better", "airmass"];
const LOG_COLUMNS: [&str; 4] = ["tile_pk", "target_id", "date_obs", "success"];

impl super::Database {
    /// Next free per-field tile sequence number.
    pub fn next_tile_id(&self, field_id: i64) -> Result<i64> {
        let max = self.select_max(&["tile"], "tile_id", Some(&Expr::eq("field_id", field_id)))?;
        Ok(max.and_then(|v| v.as_i64()).map_or(1, |id| id + 1))
    }

    /// Writes configured tiles with their fibre assignments, scores and
    /// configuration rows.
    ///
    /// `tile_pk` is generated on insert, so each tile is written first and
    /// read back by `(field_id, tile_id)` before its dependent rows go in.
    /// Everything happens in one transaction. In dry-run mode no key comes
    /// back, so only the tile statements are recorded and nothing is
    /// returned.
    pub fn insert_tiles(&self, tiles: &[NewTile]) -> Result<Vec<Tile>> {
        self.with_transaction(|db| {
            let mut written = Vec::with_capacity(tiles.len());
            for tile in tiles {
                let tile_id = db.next_tile_id(tile.field_id)?;
                db.insert_row(
                    "tile",
                    &["tile_id", "field_id", "is_queued", "is_observed"],
                    vec![
                        tile_id.into(),
                        tile.field_id.into(),
                        tile.queue.into(),
                        false.into(),
                    ],
                    false,
                )?;

                let Some(stored) = db
                    .read_tiles(Some(
                        Expr::eq("field_id", tile.field_id).and(Expr::eq("tile_id", tile_id)),
                    ))?
                    .pop()
                else {
                    if db.is_dry_run() {
                        continue;
                    }
                    return Err(TaipanError::data_integrity(format!(
                        "tile {tile_id} of field {} was not found after insert",
                        tile.field_id
                    )));
                };
                db.write_tile_details(stored.tile_pk, tile)?;
                debug!(
                    "Inserted tile {} (field {}, tile_id {tile_id}) with {} fibres",
                    stored.tile_pk,
                    tile.field_id,
                    tile.fibres.len()
                );
                written.push(stored);
            }
            info!("Inserted {} tiles", written.len());
            Ok(written)
        })
    }

    fn write_tile_details(&self, tile_pk: i64, tile: &NewTile) -> Result<()> {
        let fibres: Vec<Vec<Value>> = tile
            .fibres
            .iter()
            .map(|f| vec![tile_pk.into(), f.bug_id.into(), f.target_id.into()])
            .collect();
        self.insert_many_rows(
            "target_field",
            &["tile_pk", "bug_id", "target_id"],
            &fibres,
            InsertOptions::default(),
        )?;

        let m = &tile.metrics;
        self.insert_row(
            "tiling_info",
            &TILING_INFO_COLUMNS,
            vec![
                tile_pk.into(),
                tile.field_id.into(),
                m.diff_sum.into(),
                m.prior_sum.into(),
                m.cw_sum.into(),
                m.n_sci.into(),
                m.n_std.into(),
                m.n_guide.into(),
                m.n_sky.into(),
            ],
            false,
        )?;
        self.insert_row(
            "tiling_config",
            &TILING_CONFIG_COLUMNS,
            vec![
                tile_pk.into(),
                tile.date_config.into(),
                tile.hrs_better.into(),
                tile.airmass.into(),
            ],
            false,
        )?;
        Ok(())
    }

    /// Queues unobserved tiles.
    pub fn queue_tiles(&self, tile_pks: &[i64]) -> Result<usize> {
        self.update_rows_by_key(
            "tile",
            "tile_pk",
            tile_pks,
            &[Assignment::set("is_queued", true)],
            Some(&Expr::eq("is_observed", false)),
        )
    }

    /// Marks tiles observed, which also takes them off the queue, and
    /// stamps their configuration rows with `date_obs`.
    pub fn observe_tiles(&self, tile_pks: &[i64], date_obs: Timestamp) -> Result<usize> {
        self.with_transaction(|db| {
            let observed = db.update_rows_by_key(
                "tile",
                "tile_pk",
                tile_pks,
                &[
                    Assignment::set("is_observed", true),
                    Assignment::set("is_queued", false),
                ],
                None,
            )?;
            db.update_rows_by_key(
                "tiling_config",
                "tile_pk",
                tile_pks,
                &[Assignment::set("date_obs", date_obs)],
                None,
            )?;
            info!("Marked {observed} tiles observed");
            Ok(observed)
        })
    }

    /// Deletes tiles; fibre assignments, scores and configuration rows go
    /// with them through the schema's cascades.
    pub fn delete_tiles(&self, tile_pks: &[i64]) -> Result<usize> {
        if tile_pks.is_empty() {
            return Ok(0);
        }
        self.delete_rows(
            "tile",
            Some(&Expr::in_list("tile_pk", tile_pks.iter().copied())),
        )
    }

    pub fn read_tiles(&self, filter: Option<Expr>) -> Result<Vec<Tile>> {
        let table = self.select(
            "tile",
            &Select::new()
                .columns(TILE_COLUMNS)
                .maybe_filter(filter)
                .order_by("tile_pk"),
        )?;
        table.records().map(|r| Tile::from_record(&r)).collect()
    }

    pub fn read_tiling_info(&self, filter: Option<Expr>) -> Result<Vec<TilingInfo>> {
        let table = self.select(
            "tiling_info",
            &Select::new().maybe_filter(filter).order_by("tile_pk"),
        )?;
        table.records().map(|r| TilingInfo::from_record(&r)).collect()
    }

    pub fn read_tiling_config(&self, filter: Option<Expr>) -> Result<Vec<TilingConfig>> {
        let table = self.select(
            "tiling_config",
            &Select::new().maybe_filter(filter).order_by("tile_pk"),
        )?;
        table.records().map(|r| TilingConfig::from_record(&r)).collect()
    }

    /// Appends observation outcomes; log rows are never updated.
    pub fn append_observing_log(&self, entries: &[ObservingLogEntry]) -> Result<usize> {
        let rows: Vec<Vec<Value>> = entries
            .iter()
            .map(|e| {
                vec![
                    e.tile_pk.into(),
                    e.target_id.into(),
                    e.date_obs.into(),
                    e.success.into(),
                ]
            })
            .collect();
        self.insert_many_rows("observing_log", &LOG_COLUMNS, &rows, InsertOptions::default())
    }

    pub fn read_observing_log(&self, filter: Option<Expr>) -> Result<Vec<ObservingLogEntry>> {
        let table = self.select(
            "observing_log",
            &Select::new()
                .columns(LOG_COLUMNS)
                .maybe_filter(filter)
                .order_by("log_pk"),
        )?;
        table
            .records()
            .map(|r| {
                Ok(ObservingLogEntry {
                    tile_pk: r.i64("tile_pk")?,
                    target_id: r.i64("target_id")?,
                    date_obs: r.timestamp("date_obs")?,
                    success: r.bool("success")?,
                })
            })
            .collect()
    }

    /// Survey-wide counts; all zero in dry-run mode.
    pub fn survey_summary(&self) -> Result<SurveySummary> {
        let real_target = || Expr::ne("target_id", SKY_TARGET_ID);
        let role_count = |flag: &str| {
            self.count(&["target"], Some(&real_target().and(Expr::eq(flag, true))))
        };
        let unobserved = Expr::eq("is_observed", false);
        let counter_sum = |column: &str| -> Result<i64> {
            Ok(self
                .select_aggregate(
                    &["tiling_info", "tile"],
                    Aggregate::Sum,
                    column,
                    Some(&unobserved),
                )?
                .and_then(|v| v.as_i64())
                .unwrap_or(0))
        };

        Ok(SurveySummary {
            version: self.current_version()?,
            fields: self.count(&["field"], None)?,
            active_fields: self.count(&["field"], Some(&Expr::eq("is_active", true)))?,
            science_targets: self.count(&["science_target"], None)?,
            science_done: self.count(&["science_target"], Some(&Expr::is_not_null("done")))?,
            standards: role_count("is_standard")?,
            guides: role_count("is_guide")?,
            skies: role_count("is_sky")?,
            tiles: self.count(&["tile"], None)?,
            queued_tiles: self.count(&["tile"], Some(&Expr::eq("is_queued", true)))?,
            observed_tiles: self.count(&["tile"], Some(&Expr::eq("is_observed", true)))?,
            n_sci_rem: counter_sum("n_sci_rem")?,
            n_sci_alloc: counter_sum("n_sci_alloc")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        models::{FibreAssignment, Field, Target, TargetRole},
    };

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.insert_fields(&[Field::new(7, 10.0, -30.0), Field::new(8, 20.0, -30.0)])
            .unwrap();
        db.insert_targets(&[
            Target::new(1, 10.1, -30.0, TargetRole::Standard),
            Target::new(2, 10.2, -30.0, TargetRole::Guide),
        ])
        .unwrap();
        db
    }

    fn fibres() -> Vec<FibreAssignment> {
        vec![
            FibreAssignment::new(1, 1),
            FibreAssignment::new(2, 2),
            FibreAssignment::new(3, SKY_TARGET_ID),
        ]
    }

    #[test]
    fn test_tile_ids_are_per_field() {
        let db = seeded();
        let tiles = db
            .insert_tiles(&[
                NewTile::new(7, fibres()),
                NewTile::new(7, fibres()),
                NewTile::new(8, fibres()).queued(),
            ])
            .unwrap();
        let ids: Vec<_> = tiles.iter().map(|t| (t.field_id, t.tile_id)).collect();
        assert_eq!(ids, vec![(7, 1), (7, 2), (8, 1)]);
        assert!(tiles[2].is_queued);
        assert_eq!(db.read_tiling_info(None).unwrap().len(), 3);
        assert_eq!(db.count(&["target_field"], None).unwrap(), 9);
    }

    #[test]
    fn test_observe_retires_queue() {
        let db = seeded();
        let tiles = db.insert_tiles(&[NewTile::new(7, fibres()).queued()]).unwrap();
        let pk = tiles[0].tile_pk;
        let when: Timestamp = "2019-03-01T12:00:00Z".parse().unwrap();
        assert_eq!(db.observe_tiles(&[pk], when).unwrap(), 1);

        let tile = db.read_tiles(None).unwrap().remove(0);
        assert!(tile.is_observed);
        assert!(!tile.is_queued);
        assert_eq!(db.read_tiling_config(None).unwrap()[0].date_obs, Some(when));
        assert_eq!(db.queue_tiles(&[pk]).unwrap(), 0);
    }

    #[test]
    fn test_delete_cascades() {
        let db = seeded();
        let tiles = db.insert_tiles(&[NewTile::new(7, fibres())]).unwrap();
        db.append_observing_log(&[ObservingLogEntry {
            tile_pk: tiles[0].tile_pk,
            target_id: 1,
            date_obs: Timestamp::now(),
            success: true,
        }])
        .unwrap();

        assert_eq!(db.delete_tiles(&[tiles[0].tile_pk]).unwrap(), 1);
        assert_eq!(db.count(&["target_field"], None).unwrap(), 0);
        assert_eq!(db.count(&["tiling_info"], None).unwrap(), 0);
        assert_eq!(db.count(&["tiling_config"], None).unwrap(), 0);
        assert_eq!(db.read_observing_log(None).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_fibre_target_rolls_back() {
        let db = seeded();
        let result = db.insert_tiles(&[NewTile::new(7, vec![FibreAssignment::new(1, 999)])]);
        assert!(result.is_err());
        assert_eq!(db.count(&["tile"], None).unwrap(), 0);
    }

    #[test]
    fn test_summary_counts() {
        let db = seeded();
        db.insert_tiles(&[NewTile::new(7, fibres()).queued()]).unwrap();
        let summary = db.survey_summary().unwrap();
        assert_eq!(summary.version.as_deref(), Some("0.0.3"));
        assert_eq!(summary.fields, 2);
        assert_eq!(summary.standards, 1);
        assert_eq!(summary.guides, 1);
        assert_eq!(summary.skies, 0);
        assert_eq!(summary.queued_tiles, 1);
    }

    #[test]
    fn test_dry_run_insert_returns_nothing() {
        let db = Database::dry_run();
        let tiles = db.insert_tiles(&[NewTile::new(7, fibres())]).unwrap();
        assert!(tiles.is_empty());
        assert!(db.statements().iter().any(|s| s.starts_with("INSERT INTO tile ")));
    }
}
