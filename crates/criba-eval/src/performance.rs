//! Portfolio performance evaluation.
//!
//! A portfolio's return on a date is the weighted sum of its constituents'
//! returns on that date. The resulting series is summarized into a
//! [`PerformanceReport`]: arithmetic mean, sample standard deviation, their
//! ratio (Sharpe, no risk-free rate, not annualized) and the 5% type-7
//! quantile as Value-at-Risk.
//!
//! Degenerate inputs never fail: an empty portfolio or series gives NaN
//! statistics, a zero volatility gives an infinite or NaN Sharpe ratio.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use criba_select::Portfolio;
use criba_traits::stats::{mean, quantile, sample_std};
use criba_traits::{CribaError, Date, InstrumentId, Result, ReturnSeries};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tail probability used for Value-at-Risk.
pub const VAR_LEVEL: f64 = 0.05;

/// How dates on which a constituent has no return are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReturnPolicy {
    /// Only dates on which every constituent reports a return are used.
    #[default]
    RequireAll,
    /// Every date any constituent reports is used; a missing return adds 0
    /// to the weighted sum.
    ZeroFill,
}

impl fmt::Display for MissingReturnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequireAll => write!(f, "require_all"),
            Self::ZeroFill => write!(f, "zero_fill"),
        }
    }
}

impl FromStr for MissingReturnPolicy {
    type Err = CribaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "require_all" => Ok(Self::RequireAll),
            "zero_fill" => Ok(Self::ZeroFill),
            other => Err(CribaError::InvalidData(format!(
                "unknown missing-return policy '{other}' (expected require_all or zero_fill)"
            ))),
        }
    }
}

/// Summary statistics of a portfolio return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Arithmetic mean period return
    pub average_return: f64,
    /// Sample standard deviation of period returns
    pub volatility: f64,
    /// `average_return / volatility`
    pub sharpe_ratio: f64,
    /// 5th percentile of period returns; negative means a loss
    pub value_at_risk_5pct: f64,
    /// Number of periods in the series
    pub periods: usize,
}

impl PerformanceReport {
    /// Summarize a return series.
    ///
    /// # Examples
    ///
    /// ```
    /// use criba_eval::PerformanceReport;
    ///
    /// let report = PerformanceReport::from_returns(&[0.02, -0.01, 0.03, 0.0]);
    /// assert_eq!(report.periods, 4);
    /// assert!((report.average_return - 0.01).abs() < 1e-12);
    /// assert!(report.value_at_risk_5pct < 0.0);
    /// ```
    pub fn from_returns(returns: &[f64]) -> Self {
        let average_return = mean(returns);
        let volatility = sample_std(returns);
        Self {
            average_return,
            volatility,
            sharpe_ratio: average_return / volatility,
            value_at_risk_5pct: quantile(returns, VAR_LEVEL),
            periods: returns.len(),
        }
    }

    /// The report of an empty series.
    pub const fn undefined() -> Self {
        Self {
            average_return: f64::NAN,
            volatility: f64::NAN,
            sharpe_ratio: f64::NAN,
            value_at_risk_5pct: f64::NAN,
            periods: 0,
        }
    }

    /// Whether every statistic is finite.
    pub fn is_defined(&self) -> bool {
        [
            self.average_return,
            self.volatility,
            self.sharpe_ratio,
            self.value_at_risk_5pct,
        ]
        .iter()
        .all(|x| x.is_finite())
    }
}

/// Evaluates weighted portfolios against per-instrument return series.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceEvaluator {
    policy: MissingReturnPolicy,
}

impl PerformanceEvaluator {
    /// Create an evaluator with the given missing-return policy.
    pub const fn new(policy: MissingReturnPolicy) -> Self {
        Self { policy }
    }

    /// The missing-return policy in use.
    pub const fn policy(&self) -> MissingReturnPolicy {
        self.policy
    }

    /// The portfolio's period return series.
    ///
    /// Candidate dates are the union of the constituents' return dates. The
    /// returns are laid out as a dates x constituents matrix and multiplied by
    /// the weight vector; rows are filtered or zero-filled per the policy.
    pub fn portfolio_returns(
        &self,
        portfolio: &Portfolio,
        returns: &BTreeMap<InstrumentId, ReturnSeries>,
    ) -> ReturnSeries {
        let constituents: Vec<(&InstrumentId, f64)> = portfolio.iter().collect();
        if constituents.is_empty() {
            return ReturnSeries::default();
        }

        let dates: Vec<Date> = constituents
            .iter()
            .filter_map(|(id, _)| returns.get(*id))
            .flat_map(|series| series.dates().iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut matrix = Array2::from_elem((dates.len(), constituents.len()), f64::NAN);
        for (col, (id, _)) in constituents.iter().enumerate() {
            let Some(series) = returns.get(*id) else {
                continue;
            };
            for (date, r) in series.iter() {
                if let Ok(row) = dates.binary_search(&date) {
                    matrix[[row, col]] = r;
                }
            }
        }

        let (dates, matrix) = match self.policy {
            MissingReturnPolicy::RequireAll => {
                let keep: Vec<usize> = (0..dates.len())
                    .filter(|&row| matrix.row(row).iter().all(|r| !r.is_nan()))
                    .collect();
                if keep.len() < dates.len() {
                    debug!(
                        dropped = dates.len() - keep.len(),
                        "dates without a return for every constituent"
                    );
                }
                (
                    keep.iter().map(|&row| dates[row]).collect::<Vec<_>>(),
                    matrix.select(ndarray::Axis(0), &keep),
                )
            }
            MissingReturnPolicy::ZeroFill => {
                matrix.mapv_inplace(|r| if r.is_nan() { 0.0 } else { r });
                (dates, matrix)
            }
        };

        let weights: Array1<f64> = constituents.iter().map(|(_, w)| *w).collect();
        let portfolio_returns = matrix.dot(&weights).to_vec();
        ReturnSeries::from_sorted(dates, portfolio_returns)
    }

    /// Evaluate a portfolio.
    pub fn evaluate(
        &self,
        portfolio: &Portfolio,
        returns: &BTreeMap<InstrumentId, ReturnSeries>,
    ) -> PerformanceReport {
        if portfolio.is_empty() {
            warn!("evaluating an empty portfolio; report is undefined");
            return PerformanceReport::undefined();
        }
        let series = self.portfolio_returns(portfolio, returns);
        let report = PerformanceReport::from_returns(series.returns());
        if report.volatility == 0.0 {
            warn!(periods = report.periods, "zero volatility; Sharpe ratio is undefined");
        }
        debug!(
            constituents = portfolio.len(),
            periods = report.periods,
            average_return = report.average_return,
            volatility = report.volatility,
            "portfolio evaluated"
        );
        report
    }
}

/// Evaluate a portfolio with the default [`MissingReturnPolicy`].
pub fn evaluate(
    portfolio: &Portfolio,
    returns: &BTreeMap<InstrumentId, ReturnSeries>,
) -> PerformanceReport {
    PerformanceEvaluator::default().evaluate(portfolio, returns)
}

/// Tabulate labelled reports into a DataFrame, one row per report.
pub fn reports_to_frame(reports: &[(String, PerformanceReport)]) -> PolarsResult<DataFrame> {
    let labels: Vec<&str> = reports.iter().map(|(label, _)| label.as_str()).collect();
    let column = |f: fn(&PerformanceReport) -> f64| -> Vec<f64> {
        reports.iter().map(|(_, r)| f(r)).collect()
    };
    let periods: Vec<u32> = reports
        .iter()
        .map(|(_, r)| u32::try_from(r.periods).unwrap_or(u32::MAX))
        .collect();
    df! {
        "portfolio" => labels,
        "average_return" => column(|r| r.average_return),
        "volatility" => column(|r| r.volatility),
        "sharpe_ratio" => column(|r| r.sharpe_ratio),
        "value_at_risk_5pct" => column(|r| r.value_at_risk_5pct),
        "periods" => periods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use criba_select::equal_weight;

    fn d(month: u32) -> Date {
        Date::from_ymd_opt(2020, month, 1).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> ReturnSeries {
        ReturnSeries::new(
            points.iter().map(|(m, _)| d(*m)).collect(),
            points.iter().map(|(_, r)| *r).collect(),
        )
        .unwrap()
    }

    fn universe() -> BTreeMap<InstrumentId, ReturnSeries> {
        BTreeMap::from([
            (
                "A".to_string(),
                series(&[(2, 0.02), (3, -0.01), (4, 0.03), (5, 0.01)]),
            ),
            (
                "B".to_string(),
                series(&[(2, 0.00), (3, 0.04), (4, -0.02), (5, 0.02)]),
            ),
            // C has no return in March.
            ("C".to_string(), series(&[(2, 0.01), (4, 0.05), (5, -0.03)])),
        ])
    }

    fn portfolio(ids: &[&str]) -> Portfolio {
        equal_weight(&ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_report_statistics() {
        let report = PerformanceReport::from_returns(&[0.01, 0.03, -0.02, 0.02]);
        assert_relative_eq!(report.average_return, 0.01, epsilon = 1e-12);
        // deviations 0, .02, -.03, .01 -> SS = 0.0014, var = 0.0014/3
        let vol = (0.0014_f64 / 3.0).sqrt();
        assert_relative_eq!(report.volatility, vol, epsilon = 1e-12);
        assert_relative_eq!(report.sharpe_ratio, 0.01 / vol, epsilon = 1e-9);
        // sorted -.02, .01, .02, .03; h = 0.15 -> -0.02 + 0.15 * 0.03
        assert_relative_eq!(report.value_at_risk_5pct, -0.0155, epsilon = 1e-12);
        assert_eq!(report.periods, 4);
        assert!(report.is_defined());
    }

    #[test]
    fn test_single_instrument_matches_own_statistics() {
        let returns = universe();
        let report = evaluate(&portfolio(&["A"]), &returns);
        let own = PerformanceReport::from_returns(returns["A"].returns());
        assert_eq!(report, own);
    }

    #[test]
    fn test_equal_weight_two_instruments() {
        let returns = universe();
        let series =
            PerformanceEvaluator::default().portfolio_returns(&portfolio(&["A", "B"]), &returns);
        assert_eq!(series.dates(), &[d(2), d(3), d(4), d(5)]);
        let expected = [0.01, 0.015, 0.005, 0.015];
        for (got, want) in series.returns().iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_require_all_drops_incomplete_dates() {
        let returns = universe();
        let evaluator = PerformanceEvaluator::new(MissingReturnPolicy::RequireAll);
        let series = evaluator.portfolio_returns(&portfolio(&["A", "C"]), &returns);
        assert_eq!(series.dates(), &[d(2), d(4), d(5)]);
        assert_relative_eq!(series.returns()[0], 0.015, epsilon = 1e-12);
        assert_relative_eq!(series.returns()[1], 0.04, epsilon = 1e-12);
        assert_relative_eq!(series.returns()[2], -0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_fill_keeps_incomplete_dates() {
        let returns = universe();
        let evaluator = PerformanceEvaluator::new(MissingReturnPolicy::ZeroFill);
        let series = evaluator.portfolio_returns(&portfolio(&["A", "C"]), &returns);
        assert_eq!(series.dates(), &[d(2), d(3), d(4), d(5)]);
        // March: only A reports, 0.5 * -0.01 + 0.5 * 0
        assert_relative_eq!(series.get(d(3)).unwrap(), -0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_constituent_without_series() {
        let returns = universe();
        let p = portfolio(&["A", "GHOST"]);

        let strict = PerformanceEvaluator::new(MissingReturnPolicy::RequireAll).evaluate(&p, &returns);
        assert_eq!(strict.periods, 0);
        assert!(strict.average_return.is_nan());

        let filled = PerformanceEvaluator::new(MissingReturnPolicy::ZeroFill).evaluate(&p, &returns);
        assert_eq!(filled.periods, 4);
        assert_relative_eq!(filled.average_return, 0.5 * 0.0125, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_reports() {
        let returns = universe();
        let empty = evaluate(&Portfolio::empty(), &returns);
        assert_eq!(empty.periods, 0);
        assert!(empty.average_return.is_nan());
        assert!(empty.sharpe_ratio.is_nan());
        assert!(empty.value_at_risk_5pct.is_nan());

        let flat = PerformanceReport::from_returns(&[0.5, 0.5, 0.5]);
        assert_eq!(flat.volatility, 0.0);
        assert!(flat.sharpe_ratio.is_infinite());
        assert!(!flat.is_defined());

        let single = PerformanceReport::from_returns(&[0.02]);
        assert_eq!(single.average_return, 0.02);
        assert!(single.volatility.is_nan());
        assert!(single.sharpe_ratio.is_nan());
        assert_eq!(single.value_at_risk_5pct, 0.02);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "zero-fill".parse::<MissingReturnPolicy>().unwrap(),
            MissingReturnPolicy::ZeroFill
        );
        assert_eq!(
            MissingReturnPolicy::RequireAll
                .to_string()
                .parse::<MissingReturnPolicy>()
                .unwrap(),
            MissingReturnPolicy::RequireAll
        );
        assert!("forward_fill".parse::<MissingReturnPolicy>().is_err());
    }

    #[test]
    fn test_reports_to_frame() {
        let frame = reports_to_frame(&[
            ("benchmark".to_string(), PerformanceReport::from_returns(&[0.01, 0.02])),
            ("p2b[0-0.2]".to_string(), PerformanceReport::undefined()),
        ])
        .unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 6);
    }
}
