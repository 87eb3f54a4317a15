//! High-level async survey API.
//!
//! [`Survey`] wraps the synchronous [`Database`] layer for async callers.
//! Every method moves its work onto tokio's blocking pool and opens a fresh
//! connection there, so a `Survey` is cheap to clone and share between
//! tasks.
//!
//! ```text
//!   async caller
//!        │
//!        ▼
//!   ┌──────────┐  spawn_blocking   ┌──────────────┐
//!   │  Survey  │ ────────────────▶ │ Database     │──▶ SQLite file
//!   └──────────┘                   │ (per task)   │
//!        │                         └──────────────┘
//!        │  JoinSet + Semaphore(workers)
//!        ▼
//!   ┌──────────┐ ┌──────────┐ ┌──────────┐
//!   │ chunk 1  │ │ chunk 2  │ │ chunk n  │   field-ID partitions
//!   └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! Chunked passes (reconciliation and membership) partition field IDs, so
//! concurrent workers never write the same rows. SQLite serialises the
//! writers; the configured busy timeout decides how long each one waits.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{config::DbConfig, db::Database, error::Result, geometry::FieldGeometry};

mod builder;
mod ops;

pub use builder::SurveyBuilder;

/// Async handle on one survey database.
#[derive(Clone)]
pub struct Survey {
    pub(crate) db_path: PathBuf,
    pub(crate) config: DbConfig,
    pub(crate) geometry: Arc<dyn FieldGeometry>,
}

impl Survey {
    pub(crate) fn new(db_path: PathBuf, config: DbConfig, geometry: Arc<dyn FieldGeometry>) -> Self {
        Self {
            db_path,
            config,
            geometry,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Opens a synchronous connection with this survey's settings.
    pub fn open(&self) -> Result<Database> {
        Database::open_with(&self.db_path, &self.config)
    }
}

impl fmt::Debug for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Survey")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
