//! Core trait definition for weighting strategies.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use criba_traits::{CribaError, InstrumentId, Result, ReturnSeries};
use serde::{Deserialize, Serialize};

use crate::portfolio::Portfolio;
use crate::{
    EqualWeighter, FactorWeightConfig, FactorWeighter, InverseVolConfig, InverseVolWeighter,
};

/// Side data a weighting strategy may draw on.
///
/// Equal weighting ignores it; other strategies read window-mean factor
/// values or per-instrument return history.
#[derive(Debug, Clone, Copy)]
pub struct WeightingContext<'a> {
    /// Window-mean factor value per instrument.
    pub window_means: &'a BTreeMap<InstrumentId, f64>,
    /// Return series per instrument over the evaluation window.
    pub returns: &'a BTreeMap<InstrumentId, ReturnSeries>,
}

impl WeightingContext<'static> {
    /// A context carrying no side data.
    pub fn empty() -> Self {
        static NO_MEANS: BTreeMap<InstrumentId, f64> = BTreeMap::new();
        static NO_RETURNS: BTreeMap<InstrumentId, ReturnSeries> = BTreeMap::new();
        Self {
            window_means: &NO_MEANS,
            returns: &NO_RETURNS,
        }
    }
}

/// Turns a set of selected instruments into a weighted [`Portfolio`].
///
/// Implementations must return weights summing to 1 for a non-empty result
/// and an empty portfolio, not an error, when nothing can be weighted. They
/// are thread-safe so many configurations can be evaluated in parallel.
///
/// # Examples
///
/// ```rust,no_run
/// use std::collections::BTreeSet;
/// use criba_select::{Portfolio, Weighter, WeightingContext};
/// use criba_traits::{InstrumentId, Result};
///
/// struct FirstOnly;
///
/// impl Weighter for FirstOnly {
///     fn weigh(
///         &self,
///         instruments: &BTreeSet<InstrumentId>,
///         _context: &WeightingContext<'_>,
///     ) -> Result<Portfolio> {
///         Ok(Portfolio::proportional(
///             instruments.iter().take(1).map(|id| (id.clone(), 1.0)),
///         ))
///     }
///
///     fn name(&self) -> &str {
///         "first_only"
///     }
/// }
/// ```
pub trait Weighter: Send + Sync {
    /// Weight the selected instruments.
    ///
    /// # Errors
    ///
    /// Returns an error only if the strategy cannot honor the portfolio
    /// invariant; degenerate inputs give an empty portfolio.
    fn weigh(
        &self,
        instruments: &BTreeSet<InstrumentId>,
        context: &WeightingContext<'_>,
    ) -> Result<Portfolio>;

    /// Name of this weighting strategy.
    fn name(&self) -> &str;
}

/// Named weighting strategies, as used in configuration files and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Every selected instrument gets `1/N`.
    #[default]
    Equal,
    /// Weights proportional to the window-mean factor value.
    Factor,
    /// Weights proportional to inverse return volatility.
    InverseVol,
}

impl WeightingScheme {
    /// Instantiate the strategy; only the options matching the scheme are used.
    pub fn weighter(
        self,
        factor: &FactorWeightConfig,
        inverse_vol: &InverseVolConfig,
    ) -> Box<dyn Weighter> {
        match self {
            Self::Equal => Box::new(EqualWeighter),
            Self::Factor => Box::new(FactorWeighter::new(factor.clone())),
            Self::InverseVol => Box::new(InverseVolWeighter::new(inverse_vol.clone())),
        }
    }
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Factor => write!(f, "factor"),
            Self::InverseVol => write!(f, "inverse_vol"),
        }
    }
}

impl FromStr for WeightingScheme {
    type Err = CribaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "equal" => Ok(Self::Equal),
            "factor" => Ok(Self::Factor),
            "inverse_vol" => Ok(Self::InverseVol),
            other => Err(CribaError::InvalidData(format!(
                "unknown weighting scheme '{other}' (expected equal, factor or inverse_vol)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_round_trip() {
        for scheme in [
            WeightingScheme::Equal,
            WeightingScheme::Factor,
            WeightingScheme::InverseVol,
        ] {
            assert_eq!(scheme.to_string().parse::<WeightingScheme>().unwrap(), scheme);
        }
        assert_eq!(
            "inverse-vol".parse::<WeightingScheme>().unwrap(),
            WeightingScheme::InverseVol
        );
        assert!("market_cap".parse::<WeightingScheme>().is_err());
    }

    #[test]
    fn test_scheme_names_match_weighters() {
        let (factor, inverse_vol) = (FactorWeightConfig::default(), InverseVolConfig::default());
        let name = |scheme: WeightingScheme| {
            scheme.weighter(&factor, &inverse_vol).name().to_string()
        };
        assert_eq!(name(WeightingScheme::Equal), "equal");
        assert_eq!(name(WeightingScheme::Factor), "factor");
        assert_eq!(name(WeightingScheme::InverseVol), "inverse_vol");
    }

    #[test]
    fn test_empty_context() {
        let ctx = WeightingContext::empty();
        assert!(ctx.window_means.is_empty());
        assert!(ctx.returns.is_empty());
    }
}
