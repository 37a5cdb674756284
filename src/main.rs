//! riskdesk CLI application.

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use logging::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level {
        cli::LogLevel::Trace => "trace",
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    setup_logging(log_level, cli.json_logs);

    match cli.command {
        Commands::History(args) => cli::commands::history::run(args, &cli.config).await,
        Commands::Quote(args) => cli::commands::quote::run(args, &cli.config).await,
        Commands::Metrics(args) => cli::commands::metrics::run(args, &cli.config).await,
        Commands::Portfolio(args) => cli::commands::portfolio::run(args, &cli.config).await,
        Commands::Search(args) => cli::commands::search::run(args, &cli.config).await,
        Commands::Invalidate(args) => cli::commands::invalidate::run(args, &cli.config).await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
