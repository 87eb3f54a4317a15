//! Domain records projected out of the survey tables.
//!
//! These are ephemeral: every operation rebuilds them from the database and
//! nothing caches them between calls. Markdown rendering lives in
//! [`crate::display`].

mod field;
mod summary;
mod target;
mod tile;

pub use field::Field;
pub use summary::{
    FieldCounters, IngestReport, PositionReport, ReconcileReport, SurveySummary, VersionRecord,
};
pub use target::{ScienceTarget, Target, TargetRole, SKY_TARGET_ID};
pub use tile::{FibreAssignment, NewTile, ObservingLogEntry, Tile, TileMetrics, TilingConfig, TilingInfo};
