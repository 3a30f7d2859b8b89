//! Backtesting pipeline.
//!
//! Ties the pieces together for one panel: returns are derived once, then each
//! [`BacktestConfig`] is run as select → weigh → evaluate over the returns
//! dated after its window start. Configurations are independent and can be
//! evaluated in parallel with [`Backtest::run_grid`].

use std::collections::BTreeMap;

use criba_select::{
    FactorWeightConfig, InverseVolConfig, Portfolio, PortfolioSelector, QuantileBand,
    SelectionQuery, Weighter, WeightingContext, WeightingScheme,
};
use criba_traits::{Date, InstrumentId, Panel, Result, ReturnSeries};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::index::{IndexSeries, build_index};
use crate::performance::{MissingReturnPolicy, PerformanceEvaluator, PerformanceReport};
use crate::returns::derive_returns;

/// Backtesting configuration.
///
/// When read from JSON the factor, window, as-of date and band are required;
/// the label, weighting and missing-return fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Report label; derived from the other fields when absent
    #[serde(default)]
    pub label: Option<String>,
    /// Factor to rank instruments on
    pub factor: String,
    /// Start of the evaluation window (exclusive)
    pub window_start: Date,
    /// Date defining the candidate cross-section
    pub as_of: Date,
    /// Lower quantile of the selection band
    pub lower_quantile: f64,
    /// Upper quantile of the selection band
    pub upper_quantile: f64,
    /// Weighting strategy
    #[serde(default)]
    pub weighting: WeightingScheme,
    /// Options of [`WeightingScheme::Factor`]
    #[serde(default)]
    pub factor_weight: FactorWeightConfig,
    /// Options of [`WeightingScheme::InverseVol`]
    #[serde(default)]
    pub inverse_vol: InverseVolConfig,
    /// Handling of constituents without a return on a date
    #[serde(default)]
    pub missing_returns: MissingReturnPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            label: None,
            factor: "p2b".to_string(),
            window_start: Date::from_ymd_opt(2019, 12, 31).unwrap_or(Date::MIN),
            as_of: Date::from_ymd_opt(2020, 12, 31).unwrap_or(Date::MAX),
            lower_quantile: 0.0,
            upper_quantile: 1.0,
            weighting: WeightingScheme::default(),
            factor_weight: FactorWeightConfig::default(),
            inverse_vol: InverseVolConfig::default(),
            missing_returns: MissingReturnPolicy::default(),
        }
    }
}

impl BacktestConfig {
    /// Check the quantile band.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::InvalidQuantileRange`](criba_traits::CribaError::InvalidQuantileRange)
    /// if a bound is outside `[0, 1]` or `lower_quantile > upper_quantile`.
    pub fn validate(&self) -> Result<QuantileBand> {
        QuantileBand::new(self.lower_quantile, self.upper_quantile)
    }

    /// Label used in reports.
    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            let mut label = format!(
                "{}[{}-{}]",
                self.factor, self.lower_quantile, self.upper_quantile
            );
            match self.weighting {
                WeightingScheme::Equal => {}
                WeightingScheme::Factor if self.factor_weight.invert => {
                    label.push_str(" factor_inverted");
                }
                scheme => label.push_str(&format!(" {scheme}")),
            }
            label
        })
    }

    /// The weighting strategy this configuration asks for, with its options.
    pub fn weighter(&self) -> Box<dyn Weighter> {
        self.weighting
            .weighter(&self.factor_weight, &self.inverse_vol)
    }

    /// The selection this configuration asks for.
    pub fn selection_query(&self) -> Result<SelectionQuery> {
        Ok(SelectionQuery {
            factor: self.factor.clone(),
            window_start: self.window_start,
            as_of: self.as_of,
            band: self.validate()?,
        })
    }
}

/// Result of one backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutcome {
    /// Report label
    pub label: String,
    /// Configuration that produced this outcome
    pub config: BacktestConfig,
    /// Selection cut-points; `None` when there were no candidates
    pub cut_points: Option<(f64, f64)>,
    /// Weighted holdings
    pub portfolio: Portfolio,
    /// Performance of the holdings over the evaluation window
    pub report: PerformanceReport,
}

/// The buy-and-hold benchmark and its performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkOutcome {
    /// Index values and returns
    pub index: IndexSeries,
    /// Performance of the index returns, backfilled first return included
    pub report: PerformanceReport,
}

/// Backtesting engine over one panel.
#[derive(Debug)]
pub struct Backtest<'a> {
    panel: &'a Panel,
    returns: BTreeMap<InstrumentId, ReturnSeries>,
}

impl<'a> Backtest<'a> {
    /// Prepare a backtest over `panel`.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::IncompletePanel`](criba_traits::CribaError::IncompletePanel)
    /// if some instrument lacks an observation on some panel date.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use criba_eval::{Backtest, BacktestConfig};
    ///
    /// let backtest = Backtest::new(&panel)?;
    /// let outcome = backtest.run(&BacktestConfig::default())?;
    /// println!("Sharpe Ratio: {:.2}", outcome.report.sharpe_ratio);
    /// ```
    pub fn new(panel: &'a Panel) -> Result<Self> {
        panel.check_completeness()?;
        let returns = derive_returns(panel);
        info!(
            instruments = panel.instruments().len(),
            dates = panel.dates().len(),
            factors = panel.factor_names().len(),
            "backtest ready"
        );
        Ok(Self { panel, returns })
    }

    /// The panel under test.
    pub const fn panel(&self) -> &'a Panel {
        self.panel
    }

    /// Per-instrument return series over the whole panel.
    pub const fn returns(&self) -> &BTreeMap<InstrumentId, ReturnSeries> {
        &self.returns
    }

    /// Build and evaluate the buy-and-hold benchmark.
    ///
    /// With a window start, shares are bought at the first panel date on or
    /// after it, so the index's realized returns cover the same dates as a
    /// portfolio evaluated over that window.
    pub fn benchmark(&self, window_start: Option<Date>) -> BenchmarkOutcome {
        let index = match window_start {
            Some(start) => build_index(&self.panel.starting_at(start)),
            None => build_index(self.panel),
        };
        if index.is_empty() {
            warn!(?window_start, "benchmark window holds no dates");
        }
        let report = PerformanceReport::from_returns(&index.returns());
        BenchmarkOutcome { index, report }
    }

    /// Run one configuration.
    ///
    /// # Errors
    ///
    /// Returns a contract violation for an invalid quantile band and
    /// [`CribaError::UnknownFactor`](criba_traits::CribaError::UnknownFactor)
    /// for an untracked factor. Degenerate selections are not errors: they
    /// give an empty portfolio and an undefined report.
    pub fn run(&self, config: &BacktestConfig) -> Result<BacktestOutcome> {
        self.run_with(config, config.weighter().as_ref())
    }

    /// Run one configuration with a caller-supplied weighting strategy.
    ///
    /// The configuration's weighting fields are ignored; set its label to
    /// name the run in reports.
    ///
    /// # Errors
    ///
    /// As [`Self::run`], plus any error the weighter returns.
    pub fn run_with(
        &self,
        config: &BacktestConfig,
        weighter: &dyn Weighter,
    ) -> Result<BacktestOutcome> {
        let query = config.selection_query()?;
        let selection = PortfolioSelector::new(self.panel).select(&query)?;

        let window_returns: BTreeMap<InstrumentId, ReturnSeries> = selection
            .instruments
            .iter()
            .filter_map(|id| {
                self.returns
                    .get(id)
                    .map(|series| (id.clone(), series.after(config.window_start)))
            })
            .collect();

        let context = WeightingContext {
            window_means: &selection.window_means,
            returns: &window_returns,
        };
        let portfolio = weighter.weigh(&selection.instruments, &context)?;
        debug!(
            weighter = weighter.name(),
            selected = selection.instruments.len(),
            held = portfolio.len(),
            "portfolio weighted"
        );

        let report =
            PerformanceEvaluator::new(config.missing_returns).evaluate(&portfolio, &window_returns);

        let label = config.label();
        info!(
            label = %label,
            held = portfolio.len(),
            periods = report.periods,
            average_return = report.average_return,
            sharpe_ratio = report.sharpe_ratio,
            "backtest complete"
        );

        Ok(BacktestOutcome {
            label,
            config: config.clone(),
            cut_points: selection.cut_points,
            portfolio,
            report,
        })
    }

    /// Run many configurations in parallel.
    ///
    /// Results are in input order. A failing configuration yields an error in
    /// its own slot and does not affect the others.
    pub fn run_grid(&self, configs: &[BacktestConfig]) -> Vec<Result<BacktestOutcome>> {
        let outcomes: Vec<Result<BacktestOutcome>> =
            configs.par_iter().map(|config| self.run(config)).collect();
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            warn!(failed, total = configs.len(), "some configurations failed");
        }
        outcomes
    }
}
