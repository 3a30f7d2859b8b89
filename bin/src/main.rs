//! Criba CLI binary.
//!
//! Backtests factor-quantile equity portfolios against a buy-and-hold
//! benchmark built from a monthly price and factor panel.

mod cmd;
mod data;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use criba_traits::Date;
use criba_traits::types::parse_date;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "criba")]
#[command(about = "Factor-quantile equity portfolio backtester", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// How reports are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Aligned text table
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a factor-quantile portfolio (or a grid of them) against the benchmark
    RunBacktest(cmd::backtest::RunBacktestArgs),

    /// Build the buy-and-hold benchmark index
    Index {
        /// Panel CSV (symbol,date,close,<factors...>)
        #[arg(long)]
        panel: PathBuf,

        /// Buy at the first date on or after this one (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        window_start: Option<Date>,

        /// Write the index to this CSV file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the factors a panel tracks
    Factors {
        /// Panel CSV (symbol,date,close,<factors...>)
        #[arg(long)]
        panel: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::RunBacktest(args) => {
            cmd::backtest::run_backtest(&args)?;
        }
        Commands::Index {
            panel,
            window_start,
            output,
            format,
        } => {
            cmd::index::show_index(&panel, window_start, output.as_deref(), format)?;
        }
        Commands::Factors { panel } => {
            cmd::factors::list_factors(&panel)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber; `RUST_LOG` takes precedence over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
