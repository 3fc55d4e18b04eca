pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{EntityReader, RateBook};
use crate::providers::snapshot_file::SnapshotFileReader;
use anyhow::{Context, Result};
use tracing::{debug, info};

pub enum AppCommand {
    Report,
    Health,
}

/// Selects what a report covers and how it is shown.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Falls back to `default_project` from the config.
    pub project: Option<String>,
    pub milestone: Option<String>,
    /// Overrides the configured display currency.
    pub currency: Option<String>,
    pub json: bool,
}

pub async fn run_command(
    command: AppCommand,
    options: &ReportOptions,
    config_path: Option<&str>,
) -> Result<()> {
    info!("Marginal starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let project_id = options
        .project
        .as_deref()
        .or(config.default_project.as_deref())
        .context("No project given and no default_project configured")?;

    let reader = SnapshotFileReader::new(&config.snapshot_path);
    let snapshot = reader.fetch_snapshot(project_id).await?;

    let currency = options.currency.as_deref().unwrap_or(&config.currency);
    let rates = RateBook::new(
        currency,
        providers::rate_provider_from_config(&config.providers),
    );
    let today = chrono::Local::now().date_naive();
    let report =
        cli::report::prepare(&snapshot, options.milestone.as_deref(), &rates, today).await?;

    match command {
        AppCommand::Report => cli::report::run(&report, options.json),
        AppCommand::Health => cli::health::run(&report, options.json),
    }
}
