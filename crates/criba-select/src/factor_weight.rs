//! Factor-proportional weighting strategy.

use std::collections::BTreeSet;

use criba_traits::{InstrumentId, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::portfolio::Portfolio;
use crate::weighter::{Weighter, WeightingContext};

/// Configuration for factor-proportional weighting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeightConfig {
    /// Weight by the reciprocal of the factor instead (cheap-is-better
    /// factors such as price-to-book)
    pub invert: bool,
}

/// Weights proportional to each instrument's window-mean factor value.
///
/// Instruments whose score is missing, undefined or not strictly positive
/// get no weight. If no instrument qualifies the portfolio is empty.
#[derive(Debug, Clone, Default)]
pub struct FactorWeighter {
    config: FactorWeightConfig,
}

impl FactorWeighter {
    /// Create a new factor weighter with the given configuration.
    pub const fn new(config: FactorWeightConfig) -> Self {
        Self { config }
    }
}

impl Weighter for FactorWeighter {
    fn weigh(
        &self,
        instruments: &BTreeSet<InstrumentId>,
        context: &WeightingContext<'_>,
    ) -> Result<Portfolio> {
        let scores = instruments.iter().map(|id| {
            let score = context.window_means.get(id).copied().unwrap_or(f64::NAN);
            let score = if self.config.invert && score > 0.0 {
                score.recip()
            } else {
                score
            };
            (id.clone(), score)
        });
        let portfolio = Portfolio::proportional(scores);
        if portfolio.is_empty() && !instruments.is_empty() {
            warn!(
                selected = instruments.len(),
                "no instrument has a positive factor score"
            );
        }
        Ok(portfolio)
    }

    fn name(&self) -> &str {
        "factor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn run(weighter: &FactorWeighter, means: &[(&str, f64)]) -> Portfolio {
        let window_means: BTreeMap<InstrumentId, f64> =
            means.iter().map(|(id, m)| (id.to_string(), *m)).collect();
        let instruments: BTreeSet<InstrumentId> = window_means.keys().cloned().collect();
        let returns = BTreeMap::new();
        let ctx = WeightingContext {
            window_means: &window_means,
            returns: &returns,
        };
        weighter.weigh(&instruments, &ctx).unwrap()
    }

    #[test]
    fn test_proportional_to_factor() {
        let portfolio = run(&FactorWeighter::default(), &[("A", 1.0), ("B", 3.0)]);
        assert_relative_eq!(portfolio.weight("A").unwrap(), 0.25);
        assert_relative_eq!(portfolio.weight("B").unwrap(), 0.75);
    }

    #[test]
    fn test_inverted() {
        let weighter = FactorWeighter::new(FactorWeightConfig { invert: true });
        let portfolio = run(&weighter, &[("A", 1.0), ("B", 3.0)]);
        assert_relative_eq!(portfolio.weight("A").unwrap(), 0.75);
        assert_relative_eq!(portfolio.weight("B").unwrap(), 0.25);
    }

    #[test]
    fn test_non_positive_scores_dropped() {
        let portfolio = run(
            &FactorWeighter::default(),
            &[("A", -1.0), ("B", 2.0), ("C", f64::NAN)],
        );
        assert_eq!(portfolio.len(), 1);
        assert_relative_eq!(portfolio.weight("B").unwrap(), 1.0);

        let nothing = run(&FactorWeighter::default(), &[("A", 0.0), ("B", -2.0)]);
        assert!(nothing.is_empty());
    }
}
