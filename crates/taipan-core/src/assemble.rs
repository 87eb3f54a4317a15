//! Rebuilds tiles with their full fibre maps from the normalised tables.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    db::{Database, Select},
    error::{Result, TaipanError},
    models::{Field, ScienceTarget, Target, TargetRole, Tile, SKY_TARGET_ID},
    query::Expr,
};

/// What one fibre of an assembled tile points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FibreTarget {
    /// The empty-fibre sentinel.
    Sky,
    Science(ScienceTarget),
    /// A guide, standard or sky-catalogue target.
    Calibration(Target),
}

impl FibreTarget {
    pub fn target_id(&self) -> i64 {
        match self {
            FibreTarget::Sky => SKY_TARGET_ID,
            FibreTarget::Science(t) => t.target_id(),
            FibreTarget::Calibration(t) => t.target_id,
        }
    }
}

/// A tile with its field and every fibre resolved, keyed by `bug_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledTile {
    pub tile: Tile,
    pub field: Field,
    pub fibres: BTreeMap<i64, FibreTarget>,
}

impl AssembledTile {
    pub fn count(&self, role: TargetRole) -> usize {
        self.fibres
            .values()
            .filter(|f| match f {
                FibreTarget::Sky => role == TargetRole::Sky,
                FibreTarget::Science(_) => role == TargetRole::Science,
                FibreTarget::Calibration(t) => t.role == role,
            })
            .count()
    }
}

/// Active targets indexed by ID.
#[derive(Debug, Clone, Default)]
pub struct TargetCatalogue {
    science: HashMap<i64, ScienceTarget>,
    calibration: HashMap<i64, Target>,
}

impl TargetCatalogue {
    pub fn new(science: Vec<ScienceTarget>, calibration: Vec<Target>) -> Self {
        Self {
            science: science.into_iter().map(|t| (t.target_id(), t)).collect(),
            calibration: calibration
                .into_iter()
                .filter(|t| t.role != TargetRole::Science)
                .map(|t| (t.target_id, t))
                .collect(),
        }
    }

    pub fn load(db: &Database) -> Result<Self> {
        let science = db.read_science_targets(Some(Expr::eq("is_active", true)))?;
        let calibration = db.read_targets(None, false)?;
        Ok(Self::new(science, calibration))
    }

    pub fn len(&self) -> usize {
        self.science.len() + self.calibration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a fibre's target. An ID outside the catalogue (for example a
    /// target deactivated after the tile was configured) is an integrity
    /// violation.
    pub fn resolve(&self, target_id: i64) -> Result<FibreTarget> {
        if target_id == SKY_TARGET_ID {
            return Ok(FibreTarget::Sky);
        }
        if let Some(t) = self.science.get(&target_id) {
            return Ok(FibreTarget::Science(t.clone()));
        }
        self.calibration
            .get(&target_id)
            .map(|t| FibreTarget::Calibration(t.clone()))
            .ok_or_else(|| {
                TaipanError::data_integrity(format!(
                    "fibre references target {target_id}, which is not an active target"
                ))
            })
    }
}

/// Tiles matching `filter` with their fibre maps.
pub fn assemble_tiles(db: &Database, filter: Option<Expr>) -> Result<Vec<AssembledTile>> {
    let catalogue = TargetCatalogue::load(db)?;
    assemble_with(db, filter, &catalogue)
}

/// [`assemble_tiles`] against an already loaded catalogue.
pub fn assemble_with(
    db: &Database,
    filter: Option<Expr>,
    catalogue: &TargetCatalogue,
) -> Result<Vec<AssembledTile>> {
    let tiles = db.read_tiles(filter)?;
    if tiles.is_empty() {
        return Ok(Vec::new());
    }
    let tile_pks: Vec<i64> = tiles.iter().map(|t| t.tile_pk).collect();
    let mut field_ids: Vec<i64> = tiles.iter().map(|t| t.field_id).collect();
    field_ids.sort_unstable();
    field_ids.dedup();

    let fields: HashMap<i64, Field> = db
        .read_fields_by_id(&field_ids)?
        .into_iter()
        .map(|f| (f.field_id, f))
        .collect();

    let assignments = db.select_joined_in(
        &["target_field"],
        "tile_pk",
        &tile_pks,
        &Select::new().columns(["tile_pk", "bug_id", "target_id"]),
    )?;
    let mut fibres: HashMap<i64, BTreeMap<i64, FibreTarget>> = HashMap::new();
    for record in assignments.records() {
        fibres
            .entry(record.i64("tile_pk")?)
            .or_default()
            .insert(record.i64("bug_id")?, catalogue.resolve(record.i64("target_id")?)?);
    }

    tiles
        .into_iter()
        .map(|tile| {
            let field = fields.get(&tile.field_id).cloned().ok_or_else(|| {
                TaipanError::data_integrity(format!(
                    "tile {} references missing field {}",
                    tile.tile_pk, tile.field_id
                ))
            })?;
            Ok(AssembledTile {
                fibres: fibres.remove(&tile.tile_pk).unwrap_or_default(),
                field,
                tile,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FibreAssignment, NewTile};

    fn survey() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.insert_fields(&[Field::new(1, 10.0, -30.0)]).unwrap();
        db.insert_science_targets(&[ScienceTarget::new(
            Target::new(10, 10.5, -30.0, TargetRole::Science),
            3,
        )])
        .unwrap();
        db.insert_targets(&[Target::new(20, 10.2, -30.0, TargetRole::Guide)])
            .unwrap();
        db.insert_tiles(&[NewTile::new(
            1,
            vec![
                FibreAssignment::new(1, 10),
                FibreAssignment::new(2, 20),
                FibreAssignment::new(3, SKY_TARGET_ID),
            ],
        )])
        .unwrap();
        db
    }

    #[test]
    fn test_assembles_fibre_map() {
        let db = survey();
        let tiles = assemble_tiles(&db, None).unwrap();
        assert_eq!(tiles.len(), 1);
        let tile = &tiles[0];
        assert_eq!(tile.field.field_id, 1);
        assert_eq!(tile.fibres[&3], FibreTarget::Sky);
        assert_eq!(tile.fibres[&1].target_id(), 10);
        assert_eq!(tile.count(TargetRole::Guide), 1);
        assert_eq!(tile.count(TargetRole::Science), 1);
    }

    #[test]
    fn test_deactivated_target_is_integrity_error() {
        let db = survey();
        db.set_targets_active(&[20], false).unwrap();
        let err = assemble_tiles(&db, None).unwrap_err();
        assert!(matches!(err, TaipanError::DataIntegrity { .. }));
    }
}
