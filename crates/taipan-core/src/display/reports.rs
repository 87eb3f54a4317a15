//! Display implementations for records and operation reports.

use std::fmt;

use super::datetime::SurveyTime;
use crate::{
    assemble::{AssembledTile, FibreTarget},
    models::{
        Field, IngestReport, PositionReport, ReconcileReport, SurveySummary, TargetRole,
        VersionRecord,
    },
};

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- Field {} at ({:.4}, {:.4}){}",
            self.field_id,
            self.ra,
            self.dec,
            if self.is_active { "" } else { " (inactive)" }
        )
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- {} applied {}",
            self.version,
            SurveyTime(&self.version_date)
        )
    }
}

impl fmt::Display for SurveySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Survey summary")?;
        writeln!(f)?;
        writeln!(
            f,
            "- Schema version: {}",
            self.version.as_deref().unwrap_or("not initialised")
        )?;
        writeln!(f, "- Fields: {} ({} active)", self.fields, self.active_fields)?;
        writeln!(
            f,
            "- Science targets: {} ({} done)",
            self.science_targets, self.science_done
        )?;
        writeln!(f, "- Standards: {}", self.standards)?;
        writeln!(f, "- Guides: {}", self.guides)?;
        writeln!(f, "- Skies: {}", self.skies)?;
        writeln!(
            f,
            "- Tiles: {} ({} queued, {} observed)",
            self.tiles, self.queued_tiles, self.observed_tiles
        )?;

        writeln!(f, "\n## Unobserved tiles")?;
        writeln!(f)?;
        writeln!(f, "- Science remaining: {}", self.n_sci_rem)?;
        writeln!(f, "- Science allocated: {}", self.n_sci_alloc)?;
        Ok(())
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return writeln!(f, "No unqueued, unobserved tiles to reconcile.");
        }
        let scope = if self.requested.is_empty() {
            "all fields".to_string()
        } else {
            format!("{} requested fields", self.requested.len())
        };
        writeln!(
            f,
            "Reconciled {} fields from {scope} in {} chunks; {} tiling rows updated.",
            self.resolved, self.chunks, self.rows_updated
        )
    }
}

impl fmt::Display for PositionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Positioned {} targets in {} fields; {} new memberships.",
            self.targets, self.fields, self.rows_inserted
        )
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Loaded `{}` as {}: {} rows read, {} inserted.",
            self.path.display(),
            self.format,
            self.rows_read,
            self.rows_inserted
        )
    }
}

impl fmt::Display for FibreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FibreTarget::Sky => write!(f, "sky"),
            FibreTarget::Science(t) => {
                write!(f, "science {} (priority {})", t.target_id(), t.priority)
            }
            FibreTarget::Calibration(t) => write!(f, "{} {}", t.role, t.target_id),
        }
    }
}

impl fmt::Display for AssembledTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match (self.tile.is_observed, self.tile.is_queued) {
            (true, _) => "observed",
            (false, true) => "queued",
            (false, false) => "configured",
        };
        writeln!(
            f,
            "### Tile {} (field {} #{}, {state})",
            self.tile.tile_pk, self.field.field_id, self.tile.tile_id
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "- Fibres: {} science, {} standard, {} guide, {} sky",
            self.count(TargetRole::Science),
            self.count(TargetRole::Standard),
            self.count(TargetRole::Guide),
            self.count(TargetRole::Sky)
        )?;
        for (bug_id, target) in &self.fibres {
            writeln!(f, "  - {bug_id}: {target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_counts() {
        let summary = SurveySummary {
            version: Some("0.0.3".to_string()),
            fields: 4,
            active_fields: 3,
            tiles: 2,
            queued_tiles: 1,
            ..SurveySummary::default()
        };
        let output = summary.to_string();
        assert!(output.contains("Schema version: 0.0.3"));
        assert!(output.contains("Fields: 4 (3 active)"));
        assert!(output.contains("Tiles: 2 (1 queued, 0 observed)"));
    }

    #[test]
    fn test_skipped_reconcile() {
        let report = ReconcileReport {
            skipped: true,
            ..ReconcileReport::default()
        };
        assert!(report.to_string().contains("No unqueued"));
    }
}
