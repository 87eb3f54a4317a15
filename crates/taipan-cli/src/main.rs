//! TaipanDB command-line entry point.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use taipan_core::SurveyBuilder;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        config,
        database_file,
        no_color,
        command,
    } = Args::parse();

    let survey = SurveyBuilder::new()
        .with_config_file(config)
        .with_database_path(database_file)
        .build()
        .await
        .context("Failed to open survey database")?;

    info!("Using survey database {}", survey.database_path().display());
    let cli = Cli::new(survey, TerminalRenderer::new(!no_color));

    match command {
        Some(Migrate) => cli.migrate().await,
        Some(Version) => cli.version().await,
        Some(Ingest(args)) => cli.ingest(args).await,
        Some(Formats) => cli.formats(),
        Some(Positions(args)) => cli.positions(args).await,
        Some(Reconcile(args)) => cli.reconcile(args).await,
        Some(Fields { command }) => cli.handle_field_command(command).await,
        Some(Summary) | None => cli.summary().await,
    }
}
