//! Inverse-volatility weighting strategy.

use std::collections::BTreeSet;

use criba_traits::stats::sample_std;
use criba_traits::{InstrumentId, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::portfolio::Portfolio;
use crate::weighter::{Weighter, WeightingContext};

/// Configuration for inverse-volatility weighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverseVolConfig {
    /// Minimum number of returns needed to estimate an instrument's volatility
    pub min_observations: usize,
}

impl Default for InverseVolConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
        }
    }
}

/// Weights proportional to `1 / volatility` of each instrument's returns.
///
/// Volatility is the sample standard deviation of the instrument's return
/// series in the weighting context. Instruments with too few returns, or a
/// zero or undefined volatility, get no weight.
#[derive(Debug, Clone, Default)]
pub struct InverseVolWeighter {
    config: InverseVolConfig,
}

impl InverseVolWeighter {
    /// Create a new inverse-volatility weighter with the given configuration.
    pub const fn new(config: InverseVolConfig) -> Self {
        Self { config }
    }
}

impl Weighter for InverseVolWeighter {
    fn weigh(
        &self,
        instruments: &BTreeSet<InstrumentId>,
        context: &WeightingContext<'_>,
    ) -> Result<Portfolio> {
        let min_obs = self.config.min_observations.max(2);
        let scores = instruments.iter().map(|id| {
            let inv_vol = match context.returns.get(id) {
                Some(series) if series.len() >= min_obs => sample_std(series.returns()).recip(),
                _ => f64::NAN,
            };
            (id.clone(), inv_vol)
        });
        let portfolio = Portfolio::proportional(scores);
        if portfolio.is_empty() && !instruments.is_empty() {
            warn!(
                selected = instruments.len(),
                "no instrument has a usable volatility estimate"
            );
        }
        Ok(portfolio)
    }

    fn name(&self) -> &str {
        "inverse_vol"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use criba_traits::{Date, ReturnSeries};
    use std::collections::BTreeMap;

    fn series(returns: &[f64]) -> ReturnSeries {
        let dates = (0..returns.len())
            .map(|i| Date::from_ymd_opt(2020, i as u32 + 1, 1).unwrap())
            .collect();
        ReturnSeries::new(dates, returns.to_vec()).unwrap()
    }

    #[test]
    fn test_lower_vol_gets_more_weight() {
        let returns = BTreeMap::from([
            ("CALM".to_string(), series(&[0.01, -0.01, 0.01, -0.01])),
            ("WILD".to_string(), series(&[0.03, -0.03, 0.03, -0.03])),
        ]);
        let means = BTreeMap::new();
        let ctx = WeightingContext {
            window_means: &means,
            returns: &returns,
        };
        let instruments: BTreeSet<InstrumentId> = returns.keys().cloned().collect();

        let portfolio = InverseVolWeighter::default().weigh(&instruments, &ctx).unwrap();
        assert_relative_eq!(portfolio.weight("CALM").unwrap(), 0.75, epsilon = 1e-12);
        assert_relative_eq!(portfolio.weight("WILD").unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_volatility_excluded() {
        let returns = BTreeMap::from([
            ("FLAT".to_string(), series(&[0.25, 0.25, 0.25])),
            ("SHORT".to_string(), series(&[0.02])),
            ("OK".to_string(), series(&[0.02, -0.01, 0.0])),
        ]);
        let means = BTreeMap::new();
        let ctx = WeightingContext {
            window_means: &means,
            returns: &returns,
        };
        let mut instruments: BTreeSet<InstrumentId> = returns.keys().cloned().collect();
        instruments.insert("UNSEEN".to_string());

        let portfolio = InverseVolWeighter::default().weigh(&instruments, &ctx).unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio.weight("OK"), Some(1.0));
    }
}
