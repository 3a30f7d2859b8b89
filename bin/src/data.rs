//! Data loading utilities for the criba CLI.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use criba_eval::BacktestConfig;
use criba_traits::Panel;
use polars::prelude::*;
use serde_json::Value;
use tracing::info;

/// Load a long-format panel CSV (`symbol,date,close,<factors...>`).
///
/// Dates are parsed by the CSV reader where possible; ISO date strings are
/// accepted otherwise. Completeness is not checked here.
pub(crate) fn load_panel(path: &Path) -> Result<Panel> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.into()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("failed to read panel CSV {}", path.display()))?;

    let panel = Panel::from_frame(&df)
        .with_context(|| format!("invalid panel in {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = panel.len(),
        instruments = panel.instruments().len(),
        dates = panel.dates().len(),
        "panel loaded"
    );
    Ok(panel)
}

/// Load one backtest configuration or a list of them from a JSON file.
pub(crate) fn load_configs(path: &Path) -> Result<Vec<BacktestConfig>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid config JSON in {}", path.display()))?;
    let configs = match value {
        Value::Array(entries) => entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                serde_json::from_value(entry)
                    .with_context(|| format!("invalid config #{i} in {}", path.display()))
            })
            .collect::<Result<Vec<BacktestConfig>>>()?,
        single => vec![
            serde_json::from_value(single)
                .with_context(|| format!("invalid config in {}", path.display()))?,
        ],
    };
    if configs.is_empty() {
        anyhow::bail!("config {} lists no backtests", path.display());
    }
    Ok(configs)
}

/// Write a DataFrame to a CSV file with a header row.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = df.height(), "wrote CSV");
    Ok(())
}
