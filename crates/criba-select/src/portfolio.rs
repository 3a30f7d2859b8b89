//! Weighted instrument holdings.

use std::collections::BTreeMap;

use criba_traits::{CribaError, InstrumentId, Result};
use serde::{Deserialize, Serialize};

/// Tolerance on the sum of weights of a non-empty portfolio.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Mapping from instrument to non-negative weight.
///
/// A non-empty portfolio's weights sum to 1 within [`WEIGHT_TOLERANCE`]. The
/// empty portfolio is a valid state meaning "no position"; evaluating it
/// yields an undefined report rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    weights: BTreeMap<InstrumentId, f64>,
}

impl Portfolio {
    /// The empty portfolio.
    pub const fn empty() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Build a portfolio from explicit weights.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::InvalidWeights`] if a weight is negative or not
    /// finite, or if non-empty weights do not sum to 1.
    pub fn from_weights(weights: BTreeMap<InstrumentId, f64>) -> Result<Self> {
        if let Some((id, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(CribaError::InvalidWeights(format!(
                "weight {w} for {id} is not a finite non-negative number"
            )));
        }
        let portfolio = Self { weights };
        if !portfolio.is_empty() && (portfolio.total_weight() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(CribaError::InvalidWeights(format!(
                "weights sum to {} instead of 1",
                portfolio.total_weight()
            )));
        }
        Ok(portfolio)
    }

    // Callers guarantee non-negative weights summing to 1.
    pub(crate) const fn from_normalized(weights: BTreeMap<InstrumentId, f64>) -> Self {
        Self { weights }
    }

    /// Normalize raw scores into weights proportional to them.
    ///
    /// Scores that are not finite and strictly positive receive no weight.
    /// If nothing is left the portfolio is empty.
    pub fn proportional(scores: impl IntoIterator<Item = (InstrumentId, f64)>) -> Self {
        let kept: Vec<(InstrumentId, f64)> = scores
            .into_iter()
            .filter(|(_, s)| s.is_finite() && *s > 0.0)
            .collect();
        let total: f64 = kept.iter().map(|(_, s)| s).sum();
        if kept.is_empty() || !total.is_finite() || total <= 0.0 {
            return Self::empty();
        }
        Self::from_normalized(kept.into_iter().map(|(id, s)| (id, s / total)).collect())
    }

    /// Weight of `instrument`, if held.
    pub fn weight(&self, instrument: &str) -> Option<f64> {
        self.weights.get(instrument).copied()
    }

    /// Number of held instruments.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the portfolio holds nothing.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Held instruments, sorted.
    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.weights.keys()
    }

    /// Iterate over `(instrument, weight)` pairs in instrument order.
    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentId, f64)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }

    /// Sum of weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// The underlying weight map.
    pub const fn weights(&self) -> &BTreeMap<InstrumentId, f64> {
        &self.weights
    }
}
