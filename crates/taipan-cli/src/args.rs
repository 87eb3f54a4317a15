use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{FieldCommands, IngestArgs, PositionsArgs, ReconcileArgs};

/// Command-line interface for the Taipan survey database
///
/// Loads field and target catalogues, computes which targets fall in which
/// fields, and keeps the per-tile science counters in step with the
/// observing state. Every command works on one SQLite database file.
#[derive(Parser)]
#[command(version, about, name = "taipan")]
pub struct Args {
    /// JSON configuration file. Defaults to
    /// $XDG_CONFIG_HOME/taipan/config.json when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file. Overrides the configuration;
    /// defaults to $XDG_DATA_HOME/taipan/taipan.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands. Without one, the survey summary is shown.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show applied schema versions
    Version,
    /// Load a catalogue file in a registered format
    #[command(alias = "i")]
    Ingest(IngestArgs),
    /// List registered catalogue formats
    Formats,
    /// Compute which targets fall inside which fields
    #[command(alias = "p")]
    Positions(PositionsArgs),
    /// Recompute the per-tile science counters
    #[command(alias = "r")]
    Reconcile(ReconcileArgs),
    /// Manage fields
    #[command(alias = "f")]
    Fields {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Show survey-wide counts
    #[command(alias = "s")]
    Summary,
}
