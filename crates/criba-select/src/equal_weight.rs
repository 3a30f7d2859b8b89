//! Equal-weighted portfolio construction.

use std::collections::{BTreeMap, BTreeSet};

use criba_traits::{InstrumentId, Result};

use crate::portfolio::Portfolio;
use crate::weighter::{Weighter, WeightingContext};

/// Give every instrument the weight `1/N`.
///
/// An empty set yields the empty portfolio.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use criba_select::equal_weight;
///
/// let set: BTreeSet<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
/// let portfolio = equal_weight(&set);
/// assert_eq!(portfolio.weight("C"), Some(0.25));
/// assert!(equal_weight(&BTreeSet::new()).is_empty());
/// ```
pub fn equal_weight(instruments: &BTreeSet<InstrumentId>) -> Portfolio {
    if instruments.is_empty() {
        return Portfolio::empty();
    }
    let weight = 1.0 / instruments.len() as f64;
    let weights: BTreeMap<InstrumentId, f64> =
        instruments.iter().map(|id| (id.clone(), weight)).collect();
    Portfolio::from_normalized(weights)
}

/// Equal-weight strategy.
///
/// This is the simplest weighting strategy and the one the benchmark
/// comparison is built around: holding the whole universe equally weighted
/// tracks the buy-and-hold index.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeighter;

impl Weighter for EqualWeighter {
    fn weigh(
        &self,
        instruments: &BTreeSet<InstrumentId>,
        _context: &WeightingContext<'_>,
    ) -> Result<Portfolio> {
        Ok(equal_weight(instruments))
    }

    fn name(&self) -> &str {
        "equal"
    }
}
