//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "riskdesk")]
#[command(author, version, about = "Market data caching and portfolio risk analytics")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch historical daily bars for a symbol
    History(HistoryArgs),
    /// Fetch a live quote for a symbol
    Quote(QuoteArgs),
    /// Compute risk metrics for a single symbol
    Metrics(MetricsArgs),
    /// Compute risk metrics for a dollar-weighted portfolio
    Portfolio(PortfolioArgs),
    /// Search providers for matching symbols
    Search(SearchArgs),
    /// Clear cached data
    Invalidate(InvalidateArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    /// Ticker symbol
    #[arg(short, long)]
    pub symbol: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}

#[derive(clap::Args)]
pub struct QuoteArgs {
    /// Ticker symbol
    #[arg(short, long)]
    pub symbol: String,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}

#[derive(clap::Args)]
pub struct MetricsArgs {
    /// Ticker symbol
    #[arg(short, long)]
    pub symbol: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Annual risk-free rate override (e.g. 0.02)
    #[arg(long)]
    pub risk_free_rate: Option<f64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}

#[derive(clap::Args)]
pub struct PortfolioArgs {
    /// Dollar allocations, e.g. "AAPL=50000,GOOGL=30000,BND=20000"
    #[arg(short, long)]
    pub allocations: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Annual risk-free rate override (e.g. 0.02)
    #[arg(long)]
    pub risk_free_rate: Option<f64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}

#[derive(clap::Args)]
pub struct SearchArgs {
    /// Free-text query
    pub query: String,
}

#[derive(clap::Args)]
pub struct InvalidateArgs {
    /// Clear one symbol only
    #[arg(long, conflicts_with = "all")]
    pub symbol: Option<String>,

    /// Clear everything
    #[arg(long)]
    pub all: bool,
}
