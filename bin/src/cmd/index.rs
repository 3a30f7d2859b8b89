//! Benchmark index command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use criba_eval::Backtest;
use criba_traits::Date;

use crate::OutputFormat;
use crate::data;

/// Build the benchmark index and print it or write it to CSV.
pub(crate) fn show_index(
    panel_path: &Path,
    window_start: Option<Date>,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let panel = data::load_panel(panel_path)?;
    let backtest = Backtest::new(&panel).context("panel failed the completeness check")?;
    let benchmark = backtest.benchmark(window_start);

    if let Some(path) = output {
        let mut frame = benchmark.index.to_frame()?;
        return data::write_csv(&mut frame, path);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&benchmark)?);
        return Ok(());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Buy-and-Hold Index                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("{:<12} {:>14} {:>10}", "Date", "Value", "Return");
    println!("{}", "-".repeat(38));
    for (i, point) in benchmark.index.points().iter().enumerate() {
        let marker = if i == 0 { "*" } else { "" };
        println!(
            "{:<12} {:>14.4} {:>9.2}%{}",
            point.date,
            point.value,
            point.period_return * 100.0,
            marker
        );
    }
    println!("\n* first return backfilled with the median of the others\n");

    let report = &benchmark.report;
    println!("Performance Metrics:");
    println!("  Average Return:    {:>10.2}%", report.average_return * 100.0);
    println!("  Volatility:        {:>10.2}%", report.volatility * 100.0);
    println!("  Sharpe Ratio:      {:>10.3}", report.sharpe_ratio);
    println!("  VaR (5%):          {:>10.2}%", report.value_at_risk_5pct * 100.0);
    println!();

    Ok(())
}
