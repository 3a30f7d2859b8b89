//! Per-instrument return derivation.

use std::collections::BTreeMap;

use criba_traits::{Date, InstrumentId, Panel, ReturnSeries};
use rayon::prelude::*;
use tracing::debug;

/// Simple period-over-period returns `p[t] / p[t-1] - 1`.
///
/// The result has one element fewer than `prices`; an empty or single-price
/// input gives no returns.
///
/// # Examples
///
/// ```
/// use criba_eval::simple_returns;
///
/// let returns = simple_returns(&[10.0, 11.0, 9.9]);
/// assert_eq!(returns.len(), 2);
/// assert!((returns[0] - 0.1).abs() < 1e-12);
/// assert!((returns[1] + 0.1).abs() < 1e-12);
/// ```
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Derive the return series of every instrument in the panel.
///
/// Each instrument's observations are taken in date order; its first date has
/// no prior price and is dropped. Instruments with a single observation get an
/// empty series. Instruments are processed in parallel; the result is keyed
/// and ordered by instrument.
pub fn derive_returns(panel: &Panel) -> BTreeMap<InstrumentId, ReturnSeries> {
    let series: BTreeMap<InstrumentId, ReturnSeries> = panel
        .instruments()
        .par_iter()
        .map(|id| {
            let (dates, closes): (Vec<Date>, Vec<f64>) =
                panel.history(id).map(|obs| (obs.date(), obs.close())).unzip();
            let returns = simple_returns(&closes);
            let dates = dates.into_iter().skip(1).collect();
            (id.clone(), ReturnSeries::from_sorted(dates, returns))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    debug!(instruments = series.len(), "derived return series");
    series
}
