//! Report and summary types returned by survey-wide operations.

use std::path::PathBuf;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Science-target counters of one field, as written to `tiling_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCounters {
    pub field_id: i64,
    /// Completed targets.
    pub n_sci_obs: i64,
    /// Incomplete targets sitting on an unobserved tile.
    pub n_sci_alloc: i64,
    /// All incomplete targets.
    pub n_sci_rem: i64,
    /// Targets observed successfully.
    pub n_done: i64,
}

impl FieldCounters {
    pub fn new(field_id: i64) -> Self {
        Self {
            field_id,
            ..Self::default()
        }
    }

    /// Science targets positioned in the field, done or not.
    pub fn positioned(&self) -> i64 {
        self.n_sci_obs + self.n_sci_rem
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Field IDs as given by the caller (empty for all fields).
    pub requested: Vec<i64>,
    /// Field IDs after overlap expansion.
    pub resolved: usize,
    pub chunks: usize,
    pub rows_updated: usize,
    /// Set when nothing was eligible for update.
    pub skipped: bool,
}

impl ReconcileReport {
    pub(crate) fn merge(&mut self, other: &ReconcileReport) {
        self.chunks += other.chunks;
        self.rows_updated += other.rows_updated;
    }
}

/// Outcome of a membership (`target_posn`) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    pub fields: usize,
    pub targets: usize,
    pub rows_inserted: usize,
}

impl PositionReport {
    pub(crate) fn merge(&mut self, other: &PositionReport) {
        self.fields += other.fields;
        self.rows_inserted += other.rows_inserted;
        self.targets = self.targets.max(other.targets);
    }
}

/// Outcome of loading one catalogue file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub format: String,
    pub path: PathBuf,
    pub rows_read: usize,
    pub rows_inserted: usize,
}

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub version_date: Timestamp,
}

/// Whole-survey counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub version: Option<String>,
    pub fields: i64,
    pub active_fields: i64,
    pub science_targets: i64,
    pub science_done: i64,
    pub standards: i64,
    pub guides: i64,
    pub skies: i64,
    pub tiles: i64,
    pub queued_tiles: i64,
    pub observed_tiles: i64,
    /// Counter sums over unobserved tiles.
    pub n_sci_rem: i64,
    pub n_sci_alloc: i64,
}
