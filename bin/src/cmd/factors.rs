//! Factor listing command implementation.

use std::path::Path;

use anyhow::Result;
use criba_traits::Panel;

use crate::data;

/// Number of finite values and the mean of a factor column.
fn coverage(panel: &Panel, factor: usize) -> (usize, f64) {
    let values: Vec<f64> = panel
        .dates()
        .iter()
        .flat_map(|&date| panel.observations_on(date).map(|obs| obs.factor_at(factor)))
        .filter(|v| v.is_finite())
        .collect();
    (values.len(), criba_traits::stats::mean(&values))
}

/// List the factors a panel tracks.
pub(crate) fn list_factors(panel_path: &Path) -> Result<()> {
    let panel = data::load_panel(panel_path)?;

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                       Panel Factors                          ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    match (panel.min_date(), panel.max_date()) {
        (Some(first), Some(last)) => println!("Dates:        {first} to {last} ({})", panel.dates().len()),
        _ => println!("Dates:        none"),
    }
    println!("Instruments:  {}", panel.instruments().len());
    println!("Rows:         {}", panel.len());
    if let Err(e) = panel.check_completeness() {
        println!("Complete:     no ({e})");
    } else {
        println!("Complete:     yes");
    }
    println!();

    if panel.factor_names().is_empty() {
        println!("No numeric factor columns.\n");
        return Ok(());
    }

    println!("{:<24} {:>10} {:>14}", "Factor", "Finite", "Mean");
    println!("{}", "-".repeat(50));
    for (idx, name) in panel.factor_names().iter().enumerate() {
        let (finite, mean) = coverage(&panel, idx);
        println!("{name:<24} {:>10} {mean:>14.4}", format!("{finite}/{}", panel.len()));
    }
    println!();

    Ok(())
}
