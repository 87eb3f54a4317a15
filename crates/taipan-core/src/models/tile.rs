//! Tiles, fibre assignments and per-tile bookkeeping rows.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{db::Record, error::Result};

/// One configured observation of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub tile_pk: i64,
    /// Sequence number within the field.
    pub tile_id: i64,
    pub field_id: i64,
    pub is_queued: bool,
    pub is_observed: bool,
}

impl Tile {
    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        Ok(Self {
            tile_pk: record.i64("tile_pk")?,
            tile_id: record.i64("tile_id")?,
            field_id: record.i64("field_id")?,
            is_queued: record.bool("is_queued")?,
            is_observed: record.bool("is_observed")?,
        })
    }
}

/// Target placed on one fibre positioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FibreAssignment {
    pub bug_id: i64,
    pub target_id: i64,
}

impl FibreAssignment {
    pub fn new(bug_id: i64, target_id: i64) -> Self {
        Self { bug_id, target_id }
    }
}

/// Scores computed when a tile is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TileMetrics {
    pub diff_sum: f64,
    pub prior_sum: f64,
    pub cw_sum: f64,
    pub n_sci: i64,
    pub n_std: i64,
    pub n_guide: i64,
    pub n_sky: i64,
}

/// A tile ready to be written; `tile_id` and `tile_pk` are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTile {
    pub field_id: i64,
    pub fibres: Vec<FibreAssignment>,
    pub metrics: TileMetrics,
    pub date_config: Timestamp,
    pub hrs_better: Option<f64>,
    pub airmass: Option<f64>,
    /// Queue the tile immediately.
    pub queue: bool,
}

impl NewTile {
    pub fn new(field_id: i64, fibres: Vec<FibreAssignment>) -> Self {
        Self {
            field_id,
            fibres,
            metrics: TileMetrics::default(),
            date_config: Timestamp::now(),
            hrs_better: None,
            airmass: None,
            queue: false,
        }
    }

    pub fn queued(mut self) -> Self {
        self.queue = true;
        self
    }
}

/// One row of `tiling_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingInfo {
    pub tile_pk: i64,
    pub field_id: i64,
    pub metrics: TileMetrics,
    pub n_sci_alloc: i64,
    pub n_sci_obs: i64,
    pub n_sci_rem: i64,
    pub n_done: i64,
}

impl TilingInfo {
    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        Ok(Self {
            tile_pk: record.i64("tile_pk")?,
            field_id: record.i64("field_id")?,
            metrics: TileMetrics {
                diff_sum: record.opt_f64("diff_sum")?.unwrap_or_default(),
                prior_sum: record.opt_f64("prior_sum")?.unwrap_or_default(),
                cw_sum: record.opt_f64("cw_sum")?.unwrap_or_default(),
                n_sci: record.i64("n_sci")?,
                n_std: record.i64("n_std")?,
                n_guide: record.i64("n_guide")?,
                n_sky: record.i64("n_sky")?,
            },
            n_sci_alloc: record.i64("n_sci_alloc")?,
            n_sci_obs: record.i64("n_sci_obs")?,
            n_sci_rem: record.i64("n_sci_rem")?,
            n_done: record.i64("n_done")?,
        })
    }
}

/// Observation-event metadata for a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub tile_pk: i64,
    pub date_config: Timestamp,
    pub date_obs: Option<Timestamp>,
    pub hrs_better: Option<f64>,
    pub airmass: Option<f64>,
}

impl TilingConfig {
    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        Ok(Self {
            tile_pk: record.i64("tile_pk")?,
            date_config: record.timestamp("date_config")?,
            date_obs: record.opt_timestamp("date_obs")?,
            hrs_better: record.opt_f64("hrs_better")?,
            airmass: record.opt_f64("airmass")?,
        })
    }
}

/// One outcome appended to the observing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingLogEntry {
    pub tile_pk: i64,
    pub target_id: i64,
    pub date_obs: Timestamp,
    pub success: bool,
}
