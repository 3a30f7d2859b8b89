//! Buy-and-hold benchmark index.
//!
//! At the panel's first date every instrument present is bought for
//! [`BASE_INVESTMENT`] currency units; the resulting share counts are then
//! held fixed. The index value on a date is the market value of those shares
//! among the instruments observed on that date. An instrument without an
//! observation on a date is left out of that date's sum (no forward fill).
//!
//! The first period return is undefined. It is backfilled with the median of
//! all later period returns, which needs the full series first: values and
//! returns are computed in one pass, the backfill in a second.

use std::collections::HashMap;

use criba_traits::stats::median;
use criba_traits::{Date, Panel};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Amount invested in each instrument at the base date.
pub const BASE_INVESTMENT: f64 = 100.0;

/// One date of the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    /// Date.
    pub date: Date,
    /// Market value of the fixed share counts.
    pub value: f64,
    /// Return versus the previous date; backfilled on the first date.
    pub period_return: f64,
}

/// Ordered index values and returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    points: Vec<IndexPoint>,
}

impl IndexSeries {
    /// All points, in date order.
    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    /// Number of dates.
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series is empty.
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index value at the base date.
    pub fn base_value(&self) -> Option<f64> {
        self.points.first().map(|p| p.value)
    }

    /// Index value on `date`.
    pub fn value_on(&self, date: Date) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    /// Dates, ascending.
    pub fn dates(&self) -> Vec<Date> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Index values.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Period returns including the backfilled first one.
    pub fn returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.period_return).collect()
    }

    /// Period returns actually realized, i.e. without the backfilled first one.
    pub fn realized_returns(&self) -> Vec<f64> {
        self.points.iter().skip(1).map(|p| p.period_return).collect()
    }

    /// Convert to a `date`, `value`, `period_return` DataFrame.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let dates: Vec<String> = self.points.iter().map(|p| p.date.to_string()).collect();
        df! {
            "date" => dates,
            "value" => self.values(),
            "period_return" => self.returns(),
        }
    }
}

/// Build the buy-and-hold index of the panel.
///
/// An empty panel yields an empty series. With a single date the backfilled
/// return is NaN, as there is nothing to take the median of.
pub fn build_index(panel: &Panel) -> IndexSeries {
    let Some(base_date) = panel.min_date() else {
        return IndexSeries::default();
    };

    let shares: HashMap<&str, f64> = panel
        .observations_on(base_date)
        .map(|obs| (obs.instrument(), BASE_INVESTMENT / obs.close()))
        .collect();

    let values: Vec<f64> = panel
        .dates()
        .par_iter()
        .map(|&date| {
            if date == base_date {
                // Every constituent is worth exactly the base investment here.
                return BASE_INVESTMENT * shares.len() as f64;
            }
            panel
                .observations_on(date)
                .filter_map(|obs| shares.get(obs.instrument()).map(|n| n * obs.close()))
                .sum()
        })
        .collect();

    let mut returns = vec![f64::NAN; values.len()];
    for t in 1..values.len() {
        returns[t] = values[t] / values[t - 1] - 1.0;
    }
    returns[0] = median(&returns[1..]);

    debug!(
        dates = values.len(),
        constituents = shares.len(),
        backfilled_return = returns[0],
        "built benchmark index"
    );

    let points = panel
        .dates()
        .iter()
        .zip(values)
        .zip(returns)
        .map(|((&date, value), period_return)| IndexPoint {
            date,
            value,
            period_return,
        })
        .collect();

    IndexSeries { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use criba_traits::Observation;

    fn d(month: u32) -> Date {
        Date::from_ymd_opt(2019, month, 28).unwrap()
    }

    fn panel(rows: &[(&str, u32, f64)]) -> Panel {
        Panel::from_observations(
            rows.iter()
                .map(|(id, month, close)| Observation::new(*id, d(*month), *close)),
        )
        .unwrap()
    }

    #[test]
    fn test_balanced_two_instrument_example() {
        let panel = panel(&[("A", 1, 10.0), ("B", 1, 10.0), ("A", 2, 11.0), ("B", 2, 9.0)]);
        let index = build_index(&panel);

        assert_eq!(index.len(), 2);
        assert_eq!(index.value_on(d(1)), Some(200.0));
        assert_eq!(index.value_on(d(2)), Some(200.0));
        assert_eq!(index.points()[1].period_return, 0.0);
        // Median of the single later return.
        assert_eq!(index.points()[0].period_return, 0.0);
    }

    #[test]
    fn test_base_value_is_exact() {
        let panel = panel(&[("A", 1, 3.0), ("B", 1, 7.0), ("C", 1, 0.3), ("A", 2, 3.3)]);
        let index = build_index(&panel);
        assert_eq!(index.base_value(), Some(300.0));
    }

    #[test]
    fn test_fixed_shares_and_exclusion_of_missing() {
        let panel = panel(&[
            ("A", 1, 10.0),
            ("B", 1, 20.0),
            ("A", 2, 12.0),
            ("B", 2, 30.0),
            // B missing in March: excluded, not forward-filled
            ("A", 3, 15.0),
            // C appears after the base date: holds no shares
            ("C", 3, 50.0),
        ]);
        let index = build_index(&panel);
        let values = index.values();

        assert_relative_eq!(values[0], 200.0);
        assert_relative_eq!(values[1], 10.0 * 12.0 + 5.0 * 30.0, epsilon = 1e-12);
        assert_relative_eq!(values[2], 10.0 * 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_median_backfill_uses_later_returns() {
        let panel = panel(&[("A", 1, 100.0), ("A", 2, 110.0), ("A", 3, 99.0), ("A", 4, 108.9)]);
        let index = build_index(&panel);
        let returns = index.returns();

        assert_relative_eq!(returns[1], 0.10, epsilon = 1e-12);
        assert_relative_eq!(returns[2], -0.10, epsilon = 1e-12);
        assert_relative_eq!(returns[3], 0.10, epsilon = 1e-12);
        // median(0.10, -0.10, 0.10) = 0.10
        assert_relative_eq!(returns[0], 0.10, epsilon = 1e-12);
        assert_eq!(index.realized_returns().len(), 3);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(build_index(&Panel::default()).is_empty());

        let single = build_index(&panel(&[("A", 1, 10.0), ("B", 1, 5.0)]));
        assert_eq!(single.len(), 1);
        assert_eq!(single.base_value(), Some(200.0));
        assert!(single.points()[0].period_return.is_nan());
    }

    #[test]
    fn test_to_frame() {
        let panel = panel(&[("A", 1, 10.0), ("A", 2, 11.0)]);
        let frame = build_index(&panel).to_frame().unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.get_column_names().len(), 3);
    }
}
