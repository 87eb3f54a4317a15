//! Connection and worker-pool configuration.
//!
//! The configuration file is JSON. Keys left over from server deployments
//! (`host`, `user`, `password`, ...) are accepted and ignored, so the same file
//! can be shared between installations.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaipanError};

const XDG_PREFIX: &str = "taipan";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "taipan.db";

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_WORKERS: usize = 7;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TEMP_TABLE_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// SQLite database file; the XDG data location when absent.
    pub database: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Concurrent chunk workers for reconciliation and membership passes.
    pub workers: usize,
    /// Fields per chunk.
    pub chunk_size: usize,
    /// Rows per INSERT statement.
    pub batch_size: usize,
    /// Update batches larger than this go through a temporary table.
    pub temp_table_threshold: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            temp_table_threshold: DEFAULT_TEMP_TABLE_THRESHOLD,
        }
    }
}

impl DbConfig {
    /// Reads and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TaipanError::FileSystem {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: DbConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `$XDG_CONFIG_HOME/taipan/config.json` if it exists, defaults
    /// otherwise.
    pub fn load_default() -> Result<Self> {
        match xdg::BaseDirectories::with_prefix(XDG_PREFIX).find_config_file(CONFIG_FILE) {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("workers", self.workers),
            ("chunk_size", self.chunk_size),
            ("batch_size", self.batch_size),
        ] {
            if value == 0 {
                return Err(TaipanError::invalid_input(field).with_reason("must be at least 1"));
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Configured database path, or the XDG data location.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }
}

/// `$XDG_DATA_HOME/taipan/taipan.db`, creating the parent directory.
pub fn default_database_path() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix(XDG_PREFIX)
        .place_data_file(DATABASE_FILE)
        .map_err(|e| TaipanError::XdgDirectory(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.workers, 7);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.busy_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_ignores_server_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "db.example", "user": "survey", "password": "x",
                "database": "/tmp/survey.db", "workers": 3}}"#
        )
        .unwrap();

        let config = DbConfig::load(file.path()).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/survey.db")));
        assert_eq!(config.workers, 3);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();
        assert!(matches!(
            DbConfig::load(file.path()),
            Err(TaipanError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            DbConfig::load("/definitely/not/here.json"),
            Err(TaipanError::FileSystem { .. })
        ));
    }
}
