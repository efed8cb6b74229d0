use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundhist::cli::setup::setup;
use fundhist::core::ReturnPeriod;
use fundhist::core::log::init_logging;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch closes missing from the local history cache
    Update {
        /// Fetch even when the cache looks current
        #[arg(short, long)]
        force: bool,
    },
    /// Display trailing returns computed from the local history cache
    Returns {
        /// Only report these periods (1W, 1M, 3M, 6M, YTD, 1Y, 2Y, 3Y, 5Y, 10Y, Max)
        #[arg(short, long = "period")]
        periods: Vec<ReturnPeriod>,
    },
    /// Display latest quote details
    Details,
}

impl From<Commands> for fundhist::AppCommand {
    fn from(cmd: Commands) -> fundhist::AppCommand {
        match cmd {
            Commands::Update { force } => fundhist::AppCommand::Update { force },
            Commands::Returns { periods } => fundhist::AppCommand::Returns { periods },
            Commands::Details => fundhist::AppCommand::Details,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fundhist::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
