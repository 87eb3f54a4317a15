//! Command handlers.
//!
//! Argument structs carry the clap attributes; [`Cli`] turns them into
//! [`Survey`] calls and renders the returned records as markdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use log::debug;
use taipan_core::{
    display::{Fields, Formats, OperationStatus, Versions},
    ingest::formats,
    Expr, ReconcileOptions, Survey,
};

use crate::renderer::TerminalRenderer;

#[derive(Args)]
pub struct IngestArgs {
    #[arg(help = "Catalogue format identifier, see `taipan formats`")]
    pub format: String,
    #[arg(help = "Whitespace-delimited catalogue file")]
    pub file: PathBuf,
}

#[derive(Args)]
pub struct PositionsArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Field IDs as comma-separated list; all active fields if omitted"
    )]
    pub fields: Vec<i64>,
}

#[derive(Args)]
pub struct ReconcileArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Field IDs as comma-separated list; all fields if omitted"
    )]
    pub fields: Vec<i64>,
    #[arg(long, help = "Do not widen the field list to overlapping fields")]
    pub no_expand: bool,
    #[arg(long, help = "Only update tiles that are neither queued nor observed")]
    pub unobserved_only: bool,
    #[arg(long, help = "Fields per chunk; the configured chunk size if omitted")]
    pub chunk_size: Option<usize>,
}

impl ReconcileArgs {
    fn options(&self, default_chunk_size: usize) -> ReconcileOptions {
        ReconcileOptions {
            expand_overlaps: !self.no_expand,
            unobserved_only: self.unobserved_only,
            chunk_size: self.chunk_size.unwrap_or(default_chunk_size),
        }
    }
}

#[derive(Args)]
pub struct FieldIdsArgs {
    #[arg(required = true, help = "Field IDs")]
    pub ids: Vec<i64>,
}

#[derive(Subcommand)]
pub enum FieldCommands {
    #[command(aliases = ["l", "ls"])]
    List {
        #[arg(long, help = "Only show active fields")]
        active: bool,
    },
    #[command(alias = "a")]
    Activate(FieldIdsArgs),
    #[command(alias = "d")]
    Deactivate(FieldIdsArgs),
}

/// Runs one command against a survey and renders the outcome.
pub struct Cli {
    survey: Survey,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(survey: Survey, renderer: TerminalRenderer) -> Self {
        Self { survey, renderer }
    }

    pub async fn migrate(&self) -> Result<()> {
        let applied = self.survey.migrate().await.context("Migration failed")?;
        if applied.is_empty() {
            let version = self.survey.current_version().await?;
            let message = format!(
                "Schema is up to date at version {}",
                version.as_deref().unwrap_or("none")
            );
            return self.renderer.render(&OperationStatus::success(message).to_string());
        }
        self.renderer.render(&Versions(applied).to_string())
    }

    pub async fn version(&self) -> Result<()> {
        let versions = self.survey.versions().await?;
        self.renderer.render(&Versions(versions).to_string())
    }

    pub async fn ingest(&self, args: IngestArgs) -> Result<()> {
        let report = self
            .survey
            .ingest(&args.format, &args.file)
            .await
            .with_context(|| format!("Failed to load {}", args.file.display()))?;
        self.renderer.render(&report.to_string())
    }

    pub fn formats(&self) -> Result<()> {
        self.renderer.render(&Formats(formats()).to_string())
    }

    pub async fn positions(&self, args: PositionsArgs) -> Result<()> {
        let fields = (!args.fields.is_empty()).then_some(args.fields.as_slice());
        let report = self.survey.compute_positions(fields).await?;
        self.renderer.render(&report.to_string())
    }

    pub async fn reconcile(&self, args: ReconcileArgs) -> Result<()> {
        let options = args.options(self.survey.config().chunk_size);
        debug!("Reconcile options: {options:?}");
        let fields = (!args.fields.is_empty()).then_some(args.fields.as_slice());
        let report = self.survey.reconcile(fields, options).await?;
        self.renderer.render(&report.to_string())
    }

    pub async fn handle_field_command(&self, command: FieldCommands) -> Result<()> {
        match command {
            FieldCommands::List { active } => {
                let filter = active.then(|| Expr::eq("is_active", true));
                let fields = self.survey.fields(filter).await?;
                self.renderer.render(&Fields(fields).to_string())
            }
            FieldCommands::Activate(args) => self.set_active(&args.ids, true).await,
            FieldCommands::Deactivate(args) => self.set_active(&args.ids, false).await,
        }
    }

    async fn set_active(&self, ids: &[i64], active: bool) -> Result<()> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let changed = self.survey.set_fields_active(&ids, active).await?;
        let action = if active { "Activated" } else { "Deactivated" };
        let status = OperationStatus::for_updated(action, changed, ids.len(), "fields");
        self.renderer.render(&status.to_string())
    }

    pub async fn summary(&self) -> Result<()> {
        let summary = self.survey.summary().await?;
        self.renderer.render(&summary.to_string())
    }
}
