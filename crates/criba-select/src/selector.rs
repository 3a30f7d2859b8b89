//! Factor-quantile stock selection.
//!
//! Each instrument's factor is averaged over the evaluation window (dates
//! strictly after `window_start`) into a side table; the panel itself is
//! never widened. Among instruments observed on `as_of`, the ones whose window
//! mean lies inside the band's type-7 quantile cut-points, inclusive at both
//! ends, are selected.

use std::collections::{BTreeMap, BTreeSet};

use criba_traits::stats::{mean, quantile_sorted};
use criba_traits::{CribaError, Date, InstrumentId, Panel, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A quantile band `[lower, upper]` with `0 <= lower <= upper <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct QuantileBand {
    lower: f64,
    upper: f64,
}

impl QuantileBand {
    /// Create a validated band.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::InvalidQuantileRange`] if a bound is outside
    /// `[0, 1]` (or NaN) or `lower > upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let in_unit = |q: f64| (0.0..=1.0).contains(&q);
        if !in_unit(lower) || !in_unit(upper) || lower > upper {
            return Err(CribaError::InvalidQuantileRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// The band covering the whole cross-section.
    pub const fn full() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// Lower quantile.
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper quantile.
    pub const fn upper(&self) -> f64 {
        self.upper
    }
}

impl TryFrom<(f64, f64)> for QuantileBand {
    type Error = CribaError;

    fn try_from((lower, upper): (f64, f64)) -> Result<Self> {
        Self::new(lower, upper)
    }
}

impl From<QuantileBand> for (f64, f64) {
    fn from(band: QuantileBand) -> Self {
        (band.lower, band.upper)
    }
}

/// Parameters of one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionQuery {
    /// Factor to rank on.
    pub factor: String,
    /// Window start; only dates strictly after it are averaged.
    pub window_start: Date,
    /// Date defining the candidate cross-section.
    pub as_of: Date,
    /// Quantile band of window means to keep.
    pub band: QuantileBand,
}

/// Outcome of a selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Selected instruments, sorted.
    pub instruments: BTreeSet<InstrumentId>,
    /// Window-mean factor value of every instrument observed in the window.
    pub window_means: BTreeMap<InstrumentId, f64>,
    /// Lower and upper cut-points, `None` when there were no candidates.
    pub cut_points: Option<(f64, f64)>,
}

/// Selects instruments from a panel by factor quantile band.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioSelector<'a> {
    panel: &'a Panel,
}

impl<'a> PortfolioSelector<'a> {
    /// Create a selector reading from `panel`.
    pub const fn new(panel: &'a Panel) -> Self {
        Self { panel }
    }

    /// Per-instrument arithmetic mean of `factor` over dates after `window_start`.
    ///
    /// Instruments without an observation in the window are absent. NaN
    /// factor values are not skipped: they make the mean NaN.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::UnknownFactor`] if the panel does not track `factor`.
    pub fn window_means(&self, factor: &str, window_start: Date) -> Result<BTreeMap<InstrumentId, f64>> {
        let factor_idx = self.panel.factor_index(factor)?;
        let means = self
            .panel
            .instruments()
            .iter()
            .filter_map(|id| {
                let values: Vec<f64> = self
                    .panel
                    .history(id)
                    .filter(|obs| obs.date() > window_start)
                    .map(|obs| obs.factor_at(factor_idx))
                    .collect();
                (!values.is_empty()).then(|| (id.clone(), mean(&values)))
            })
            .collect();
        Ok(means)
    }

    /// Run a selection.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::UnknownFactor`] for an untracked factor. An empty
    /// window or an `as_of` date without observations is not an error: the
    /// selection is simply empty.
    pub fn select(&self, query: &SelectionQuery) -> Result<Selection> {
        let window_means = self.window_means(&query.factor, query.window_start)?;

        let candidates: Vec<(&str, f64)> = self
            .panel
            .observations_on(query.as_of)
            .filter_map(|obs| {
                let id = obs.instrument();
                window_means.get(id).map(|m| (id, *m))
            })
            .collect();

        if candidates.is_empty() {
            warn!(
                factor = %query.factor,
                as_of = %query.as_of,
                window_start = %query.window_start,
                "no candidates for selection"
            );
            return Ok(Selection {
                window_means,
                ..Selection::default()
            });
        }

        let (lower, upper) = if candidates.iter().any(|(_, m)| m.is_nan()) {
            (f64::NAN, f64::NAN)
        } else {
            let mut sorted: Vec<f64> = candidates.iter().map(|(_, m)| *m).collect();
            sorted.sort_by(f64::total_cmp);
            (
                quantile_sorted(&sorted, query.band.lower()),
                quantile_sorted(&sorted, query.band.upper()),
            )
        };

        let instruments: BTreeSet<InstrumentId> = candidates
            .iter()
            .filter(|(_, m)| *m >= lower && *m <= upper)
            .map(|(id, _)| (*id).to_string())
            .collect();

        debug!(
            factor = %query.factor,
            candidates = candidates.len(),
            selected = instruments.len(),
            lower,
            upper,
            "selection complete"
        );

        Ok(Selection {
            instruments,
            window_means,
            cut_points: Some((lower, upper)),
        })
    }
}

/// Select the instruments whose window-mean `factor` lies in the
/// `[lower_quantile, upper_quantile]` band on `as_of`.
///
/// # Errors
///
/// Returns [`CribaError::InvalidQuantileRange`] for an invalid band and
/// [`CribaError::UnknownFactor`] for an untracked factor.
pub fn select(
    panel: &Panel,
    factor: &str,
    window_start: Date,
    as_of: Date,
    lower_quantile: f64,
    upper_quantile: f64,
) -> Result<BTreeSet<InstrumentId>> {
    let query = SelectionQuery {
        factor: factor.to_string(),
        window_start,
        as_of,
        band: QuantileBand::new(lower_quantile, upper_quantile)?,
    };
    Ok(PortfolioSelector::new(panel).select(&query)?.instruments)
}
