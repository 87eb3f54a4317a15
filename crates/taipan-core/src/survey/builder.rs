//! Builder for creating and configuring Survey instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;
use tokio::task;

use super::Survey;
use crate::{
    config::DbConfig,
    db::Database,
    error::{Result, TaipanError},
    geometry::{ConeGeometry, FieldGeometry},
};

/// Builder for creating and configuring Survey instances.
#[derive(Clone, Default)]
pub struct SurveyBuilder {
    database_path: Option<PathBuf>,
    config: Option<DbConfig>,
    config_path: Option<PathBuf>,
    geometry: Option<Arc<dyn FieldGeometry>>,
}

impl SurveyBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom database file path, overriding the configuration.
    ///
    /// If neither is given, uses `$XDG_DATA_HOME/taipan/taipan.db` or
    /// `~/.local/share/taipan/taipan.db`.
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses an already loaded configuration.
    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Reads the configuration from a JSON file instead of the XDG location.
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.config_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Field geometry for membership and overlap expansion; a
    /// [`ConeGeometry`] of the default radius otherwise.
    pub fn with_geometry(mut self, geometry: impl FieldGeometry + 'static) -> Self {
        self.geometry = Some(Arc::new(geometry));
        self
    }

    /// Builds the survey, creating the database and applying pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns `TaipanError::FileSystem` if the database directory cannot be
    /// created, `TaipanError::InvalidInput` for an invalid configuration, and
    /// `TaipanError::Migration` if a migration fails.
    pub async fn build(self) -> Result<Survey> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => DbConfig::load(path)?,
            (None, None) => DbConfig::load_default()?,
        };
        config.validate()?;

        let db_path = match self.database_path {
            Some(path) => path,
            None => config.database_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TaipanError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db_path_clone = db_path.clone();
        let config_clone = config.clone();
        let applied = task::spawn_blocking(move || {
            let db = Database::open_with(&db_path_clone, &config_clone)?;
            db.migrate()
        })
        .await
        .map_err(|e| TaipanError::Configuration {
            message: format!("Task join error: {e}"),
        })??;
        if !applied.is_empty() {
            info!(
                "Applied {} migrations to {}",
                applied.len(),
                db_path.display()
            );
        }

        let geometry = self
            .geometry
            .unwrap_or_else(|| Arc::new(ConeGeometry::default()));
        Ok(Survey::new(db_path, config, geometry))
    }
}
