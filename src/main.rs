use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use marginal::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ReportArgs {
    /// Project id, defaults to `default_project` from the config
    #[arg(short, long)]
    project: Option<String>,

    /// Limit the report to one milestone
    #[arg(short, long)]
    milestone: Option<String>,

    /// Display currency, overrides the config
    #[arg(long)]
    currency: Option<String>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

impl From<ReportArgs> for marginal::ReportOptions {
    fn from(args: ReportArgs) -> Self {
        marginal::ReportOptions {
            project: args.project,
            milestone: args.milestone,
            currency: args.currency,
            json: args.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration and an example entity export
    Setup,
    /// Display project profit and loss
    Report(ReportArgs),
    /// Display health score and leakage insights
    Health(ReportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => match config_path {
            Some(path) => marginal::cli::setup::setup_at_path(path),
            None => marginal::cli::setup::setup(),
        },
        Some(Commands::Report(args)) => {
            marginal::run_command(marginal::AppCommand::Report, &args.into(), config_path).await
        }
        Some(Commands::Health(args)) => {
            marginal::run_command(marginal::AppCommand::Health, &args.into(), config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
