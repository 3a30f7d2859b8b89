//! Backtest command implementation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use criba_eval::{
    Backtest, BacktestConfig, BacktestOutcome, MissingReturnPolicy, PerformanceReport,
    reports_to_frame,
};
use criba_select::WeightingScheme;
use criba_traits::Date;
use criba_traits::types::parse_date;
use serde::Serialize;

use crate::OutputFormat;
use crate::data;

/// Arguments of `criba run-backtest`.
#[derive(Debug, Args)]
pub(crate) struct RunBacktestArgs {
    /// Panel CSV (symbol,date,close,<factors...>)
    #[arg(long)]
    pub(crate) panel: PathBuf,

    /// Factor to rank on
    #[arg(long)]
    pub(crate) factor: Option<String>,

    /// Lower quantile of the selection band
    #[arg(long)]
    pub(crate) lower: Option<f64>,

    /// Upper quantile of the selection band
    #[arg(long)]
    pub(crate) upper: Option<f64>,

    /// Evaluation window start, exclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) window_start: Option<Date>,

    /// Date of the candidate cross-section (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<Date>,

    /// Weighting strategy (equal, factor, inverse-vol)
    #[arg(long)]
    pub(crate) weighting: Option<WeightingScheme>,

    /// Weight by the reciprocal of the factor (cheap-is-better factors)
    #[arg(long)]
    pub(crate) invert_factor: bool,

    /// Missing-return policy (require-all, zero-fill)
    #[arg(long)]
    pub(crate) missing_returns: Option<MissingReturnPolicy>,

    /// JSON file with one configuration or a list of them
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Also write the report table to this CSV file
    #[arg(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub(crate) format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct BenchmarkRow {
    label: String,
    window_start: Date,
    report: PerformanceReport,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    benchmarks: Vec<BenchmarkRow>,
    portfolios: &'a [BacktestOutcome],
}

/// Resolve the configurations to run from the config file and flags.
///
/// Flags override fields of a single configuration; with a grid they are
/// rejected. Without a config file every selection flag is required.
pub(crate) fn resolve_configs(args: &RunBacktestArgs) -> Result<Vec<BacktestConfig>> {
    let mut configs = match &args.config {
        Some(path) => data::load_configs(path)?,
        None => {
            let missing: Vec<&str> = [
                ("--factor", args.factor.is_none()),
                ("--lower", args.lower.is_none()),
                ("--upper", args.upper.is_none()),
                ("--window-start", args.window_start.is_none()),
                ("--as-of", args.as_of.is_none()),
            ]
            .into_iter()
            .filter_map(|(flag, absent)| absent.then_some(flag))
            .collect();
            if !missing.is_empty() {
                bail!("missing {} (or pass --config)", missing.join(", "));
            }
            vec![BacktestConfig::default()]
        }
    };

    let overrides = args.factor.is_some()
        || args.lower.is_some()
        || args.upper.is_some()
        || args.window_start.is_some()
        || args.as_of.is_some()
        || args.weighting.is_some()
        || args.invert_factor
        || args.missing_returns.is_some();
    if configs.len() > 1 && overrides {
        bail!("selection flags cannot be combined with a config grid");
    }

    if let [config] = configs.as_mut_slice() {
        if let Some(factor) = &args.factor {
            config.factor.clone_from(factor);
        }
        if let Some(lower) = args.lower {
            config.lower_quantile = lower;
        }
        if let Some(upper) = args.upper {
            config.upper_quantile = upper;
        }
        if let Some(window_start) = args.window_start {
            config.window_start = window_start;
        }
        if let Some(as_of) = args.as_of {
            config.as_of = as_of;
        }
        if let Some(weighting) = args.weighting {
            config.weighting = weighting;
        }
        if args.invert_factor {
            config.factor_weight.invert = true;
        }
        if let Some(missing_returns) = args.missing_returns {
            config.missing_returns = missing_returns;
        }
    }

    for config in &configs {
        config
            .validate()
            .with_context(|| format!("invalid configuration '{}'", config.label()))?;
    }
    Ok(configs)
}

/// Run the backtest command.
pub(crate) fn run_backtest(args: &RunBacktestArgs) -> Result<()> {
    let configs = resolve_configs(args)?;
    let panel = data::load_panel(&args.panel)?;
    let backtest = Backtest::new(&panel).context("panel failed the completeness check")?;

    let window_starts: BTreeSet<Date> = configs.iter().map(|c| c.window_start).collect();
    let benchmarks: Vec<BenchmarkRow> = window_starts
        .iter()
        .map(|&window_start| BenchmarkRow {
            label: if window_starts.len() == 1 {
                "benchmark".to_string()
            } else {
                format!("benchmark>{window_start}")
            },
            window_start,
            report: backtest.benchmark(Some(window_start)).report,
        })
        .collect();

    let outcomes = configs
        .iter()
        .zip(backtest.run_grid(&configs))
        .map(|(config, outcome)| {
            outcome.with_context(|| format!("backtest '{}' failed", config.label()))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(path) = &args.output {
        write_report_csv(&benchmarks, &outcomes, path)?;
    }

    match args.format {
        OutputFormat::Json => {
            let report = RunReport {
                benchmarks,
                portfolios: &outcomes,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_text(&benchmarks, &outcomes),
    }
    Ok(())
}

fn write_report_csv(
    benchmarks: &[BenchmarkRow],
    outcomes: &[BacktestOutcome],
    path: &Path,
) -> Result<()> {
    let rows: Vec<(String, PerformanceReport)> = benchmarks
        .iter()
        .map(|b| (b.label.clone(), b.report))
        .chain(outcomes.iter().map(|o| (o.label.clone(), o.report)))
        .collect();
    let mut frame = reports_to_frame(&rows)?;
    data::write_csv(&mut frame, path)
}

fn print_text(benchmarks: &[BenchmarkRow], outcomes: &[BacktestOutcome]) {
    println!("\n╔══════════════════════════════════════════════════════════════════════════╗");
    println!("║                           Backtest Results                               ║");
    println!("╚══════════════════════════════════════════════════════════════════════════╝\n");

    if let [outcome] = outcomes {
        let config = &outcome.config;
        println!("Factor:       {}", config.factor);
        println!("Window:       > {} (as of {})", config.window_start, config.as_of);
        println!(
            "Band:         [{}, {}]",
            config.lower_quantile, config.upper_quantile
        );
        if let Some((lower, upper)) = outcome.cut_points {
            println!("Cut-points:   [{lower:.4}, {upper:.4}]");
        }
        println!("Weighting:    {}", config.weighting);
        println!("Missing:      {}", config.missing_returns);
        let held: Vec<&str> = outcome.portfolio.instruments().map(String::as_str).collect();
        println!("Holdings:     {} ({})", held.len(), held.join(", "));
        println!();
    }

    println!(
        "{:<28} {:>6} {:>8} {:>10} {:>10} {:>10} {:>10}",
        "Portfolio", "Held", "Periods", "Mean", "Vol", "Sharpe", "VaR 5%"
    );
    println!("{}", "-".repeat(88));
    for benchmark in benchmarks {
        print_row(&benchmark.label, None, &benchmark.report);
    }
    for outcome in outcomes {
        print_row(&outcome.label, Some(outcome.portfolio.len()), &outcome.report);
    }
    println!();
}

fn print_row(label: &str, held: Option<usize>, report: &PerformanceReport) {
    let held = held.map_or_else(|| "all".to_string(), |n| n.to_string());
    println!(
        "{:<28} {:>6} {:>8} {:>9.2}% {:>9.2}% {:>10.3} {:>9.2}%",
        label,
        held,
        report.periods,
        report.average_return * 100.0,
        report.volatility * 100.0,
        report.sharpe_ratio,
        report.value_at_risk_5pct * 100.0
    );
}
