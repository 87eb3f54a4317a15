//! Versioned schema and data migrations.
//!
//! Each [`Migration`] is applied at most once, in semantic-version order,
//! inside its own transaction. The `version` table records what has been
//! applied; a failing migration is rolled back completely.

use jiff::Timestamp;
use log::info;

use super::{Database, Select};
use crate::{
    error::{Result, TaipanError},
    geometry::unit_vector,
    models::{VersionRecord, SKY_TARGET_ID},
    query::Value,
    schema::builtin_definition,
};

/// One registered version update.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: &'static str,
    pub description: &'static str,
    pub apply: fn(&Database) -> Result<()>,
}

/// Migrations shipped with the crate.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0.0.1",
        description: "core survey tables and the sky sentinel target",
        apply: create_core_tables,
    },
    Migration {
        version: "0.0.2",
        description: "tile configuration and observing log tables",
        apply: create_observation_tables,
    },
    Migration {
        version: "0.0.3",
        description: "secondary indexes for membership and reconciliation",
        apply: create_indexes,
    },
];

const INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_target_posn_field ON target_posn(field_id);
CREATE INDEX IF NOT EXISTS idx_tile_field ON tile(field_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tile_field_seq ON tile(field_id, tile_id);
CREATE INDEX IF NOT EXISTS idx_target_field_target ON target_field(target_id);
CREATE INDEX IF NOT EXISTS idx_tiling_info_field ON tiling_info(field_id);
CREATE INDEX IF NOT EXISTS idx_science_target_done ON science_target(done);
";

fn create_tables(db: &Database, tables: &[&str]) -> Result<()> {
    for table in tables {
        db.execute_batch(&builtin_definition(table)?.create_sql())?;
    }
    Ok(())
}

fn create_core_tables(db: &Database) -> Result<()> {
    create_tables(
        db,
        &[
            "field",
            "target",
            "science_target",
            "target_posn",
            "tile",
            "target_field",
            "tiling_info",
        ],
    )?;
    let [ux, uy, uz] = unit_vector(0.0, 0.0);
    db.insert_row(
        "target",
        &["target_id", "ra", "dec", "ux", "uy", "uz", "is_sky", "is_active"],
        vec![
            SKY_TARGET_ID.into(),
            0.0.into(),
            0.0.into(),
            ux.into(),
            uy.into(),
            uz.into(),
            true.into(),
            false.into(),
        ],
        true,
    )?;
    Ok(())
}

fn create_observation_tables(db: &Database) -> Result<()> {
    create_tables(db, &["tiling_config", "observing_log"])
}

fn create_indexes(db: &Database) -> Result<()> {
    db.execute_batch(INDEXES_SQL)
}

/// Parses `major.minor.patch`.
pub fn parse_version(version: &str) -> Result<(u32, u32, u32)> {
    let invalid = || {
        TaipanError::invalid_input("version")
            .with_reason(format!("'{version}' is not a major.minor.patch version"))
    };
    let mut parts = version.trim().split('.').map(|p| p.parse::<u32>());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => Ok((major, minor, patch)),
        _ => Err(invalid()),
    }
}

/// Applies pending migrations against one database.
pub struct MigrationDriver<'a> {
    db: &'a Database,
    migrations: &'a [Migration],
}

impl<'a> MigrationDriver<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_migrations(db, MIGRATIONS)
    }

    pub fn with_migrations(db: &'a Database, migrations: &'a [Migration]) -> Self {
        Self { db, migrations }
    }

    fn ensure_version_table(&self) -> Result<()> {
        if self.db.is_dry_run() || !self.db.table_exists("version")? {
            self.db
                .execute_batch(&builtin_definition("version")?.create_sql())?;
        }
        Ok(())
    }

    /// Migrations not yet recorded, ordered by version.
    pub fn pending(&self) -> Result<Vec<&'a Migration>> {
        let applied = self
            .db
            .applied_versions()?
            .into_iter()
            .map(|record| parse_version(&record.version))
            .collect::<Result<Vec<_>>>()?;

        let mut pending = self
            .migrations
            .iter()
            .map(|m| Ok((parse_version(m.version)?, m)))
            .collect::<Result<Vec<_>>>()?;
        pending.retain(|(version, _)| !applied.contains(version));
        pending.sort_by_key(|(version, _)| *version);
        Ok(pending.into_iter().map(|(_, m)| m).collect())
    }

    /// Applies every pending migration; stops at the first failure, which
    /// leaves earlier versions committed and the failing one rolled back.
    pub fn apply(&self) -> Result<Vec<VersionRecord>> {
        self.ensure_version_table()?;
        let mut applied = Vec::new();
        for migration in self.pending()? {
            info!(
                "Applying version {}: {}",
                migration.version, migration.description
            );
            let record = self
                .db
                .with_transaction(|db| {
                    (migration.apply)(db)?;
                    let record = VersionRecord {
                        version: migration.version.to_string(),
                        version_date: Timestamp::now(),
                    };
                    db.insert_row(
                        "version",
                        &["version", "version_date"],
                        vec![
                            Value::from(record.version.as_str()),
                            record.version_date.into(),
                        ],
                        false,
                    )?;
                    Ok(record)
                })
                .map_err(|e| TaipanError::Migration {
                    version: migration.version.to_string(),
                    source: Box::new(e),
                })?;
            applied.push(record);
        }
        if applied.is_empty() {
            info!("Database schema is up to date");
        }
        Ok(applied)
    }
}

impl Database {
    /// Applies all pending shipped migrations.
    pub fn migrate(&self) -> Result<Vec<VersionRecord>> {
        MigrationDriver::new(self).apply()
    }

    /// Versions recorded in the `version` table, oldest first. Empty when
    /// the table does not exist yet.
    pub fn applied_versions(&self) -> Result<Vec<VersionRecord>> {
        if !self.is_dry_run() && !self.table_exists("version")? {
            return Ok(Vec::new());
        }
        let table = self.select(
            "version",
            &Select::new().order_by("version_date").order_by("version"),
        )?;
        table
            .records()
            .map(|r| {
                Ok(VersionRecord {
                    version: r.text("version")?,
                    version_date: r.timestamp("version_date")?,
                })
            })
            .collect()
    }

    /// Highest applied version.
    pub fn current_version(&self) -> Result<Option<String>> {
        let mut versions = self
            .applied_versions()?
            .into_iter()
            .map(|r| Ok((parse_version(&r.version)?, r.version)))
            .collect::<Result<Vec<_>>>()?;
        versions.sort();
        Ok(versions.pop().map(|(_, v)| v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_after_write(db: &Database) -> Result<()> {
        db.execute_batch("CREATE TABLE half_done (x integer); INSERT INTO half_done VALUES (1);")?;
        Err(TaipanError::data_integrity("boom"))
    }

    fn make_scratch(db: &Database) -> Result<()> {
        db.execute_batch("CREATE TABLE scratch (x integer)")
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.10.2").unwrap(), (0, 10, 2));
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("1.2.x").is_err());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first = db.migrate().unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());
        assert!(db.migrate().unwrap().is_empty());
        assert_eq!(db.current_version().unwrap().as_deref(), Some("0.0.3"));
        assert!(db.table_exists("observing_log").unwrap());
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let migrations = [
            Migration {
                version: "0.1.0",
                description: "scratch",
                apply: make_scratch,
            },
            Migration {
                version: "0.0.9",
                description: "fails",
                apply: failing_after_write,
            },
        ];
        let driver = MigrationDriver::with_migrations(&db, &migrations);
        let pending: Vec<_> = driver.pending().unwrap().iter().map(|m| m.version).collect();
        assert_eq!(pending, vec!["0.0.9", "0.1.0"]);

        let err = driver.apply().unwrap_err();
        assert!(matches!(err, TaipanError::Migration { ref version, .. } if version == "0.0.9"));
        assert!(db.applied_versions().unwrap().is_empty());
        assert!(!db.table_exists("half_done").unwrap());
        assert!(!db.table_exists("scratch").unwrap());
    }

    #[test]
    fn test_failure_keeps_earlier_versions() {
        let db = Database::open_in_memory().unwrap();
        let migrations = [
            Migration {
                version: "0.2.0",
                description: "fails",
                apply: failing_after_write,
            },
            Migration {
                version: "0.1.0",
                description: "scratch",
                apply: make_scratch,
            },
        ];
        let err = MigrationDriver::with_migrations(&db, &migrations)
            .apply()
            .unwrap_err();
        assert!(matches!(err, TaipanError::Migration { ref version, .. } if version == "0.2.0"));

        let applied: Vec<_> = db
            .applied_versions()
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(applied, vec!["0.1.0"]);
        assert!(db.table_exists("scratch").unwrap());
        assert!(!db.table_exists("half_done").unwrap());
    }
}
