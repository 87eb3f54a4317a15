//! Core library for TaipanDB, the survey-state database of the Taipan
//! spectroscopic survey.
//!
//! The crate stores fields, targets, tiles and observations in SQLite and
//! keeps the derived bookkeeping (field membership and per-tile science
//! counters) consistent with them.
//!
//! # Layers
//!
//! - **Query building** ([`query`]): typed predicate trees rendered to SQL
//!   with bound parameters, plus the legacy descriptor-list form.
//! - **Database** ([`db`]): a [`Database`] over a live connection or a
//!   dry-run statement log, with introspection, joined selects, batched
//!   inserts and bulk updates, transactions and the migration driver.
//! - **Survey operations** ([`reconcile`], [`positions`], [`assemble`],
//!   [`ingest`]): counter reconciliation, membership, tile assembly and
//!   catalogue loading, all synchronous against one [`Database`].
//! - **Async API** ([`survey`]): a [`Survey`] handle that runs the above on
//!   tokio's blocking pool and fans chunked passes out over workers.
//! - **Display** ([`display`]): markdown formatting for the CLI.
//!
//! # Quick Start
//!
//! ```rust
//! use taipan_core::{ReconcileOptions, SurveyBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let survey = SurveyBuilder::new()
//!     .with_database_path(Some("survey.db"))
//!     .build()
//!     .await?;
//!
//! survey.ingest("fields", "fields.txt").await?;
//! survey.ingest("science-v2", "science.txt").await?;
//! survey.compute_positions(None).await?;
//!
//! let report = survey.reconcile(None, ReconcileOptions::default()).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod models;
pub mod positions;
pub mod query;
pub mod reconcile;
pub mod schema;
pub mod survey;

// Re-export commonly used types
pub use assemble::{AssembledTile, FibreTarget};
pub use config::DbConfig;
pub use db::{Database, InsertOptions, Select, Table};
pub use display::OperationStatus;
pub use error::{Result, TaipanError};
pub use geometry::{ConeGeometry, FieldGeometry};
pub use models::{
    Field, IngestReport, NewTile, PositionReport, ReconcileReport, ScienceTarget, SurveySummary,
    Target, TargetRole, Tile, SKY_TARGET_ID,
};
pub use query::{Expr, Value};
pub use reconcile::ReconcileOptions;
pub use survey::{Survey, SurveyBuilder};
