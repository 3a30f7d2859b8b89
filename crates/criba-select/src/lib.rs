//! Factor-quantile stock selection and portfolio weighting for criba.
//!
//! Selection ranks instruments by the mean of a factor over an evaluation
//! window and keeps the ones inside a quantile band of that cross-section.
//! Weighting turns the selected set into a [`Portfolio`] through a pluggable
//! [`Weighter`]: equal weights, factor-proportional weights or inverse
//! volatility weights.
//!
//! # Examples
//!
//! ```rust,no_run
//! use criba_select::{PortfolioSelector, QuantileBand, SelectionQuery, equal_weight};
//! use criba_traits::{Date, Panel};
//!
//! # fn example(panel: &Panel) -> criba_traits::Result<()> {
//! let query = SelectionQuery {
//!     factor: "p2b".to_string(),
//!     window_start: Date::from_ymd_opt(2019, 12, 31).unwrap(),
//!     as_of: Date::from_ymd_opt(2020, 12, 31).unwrap(),
//!     band: QuantileBand::new(0.0, 0.2)?,
//! };
//! let selection = PortfolioSelector::new(panel).select(&query)?;
//! let portfolio = equal_weight(&selection.instruments);
//! # Ok(())
//! # }
//! ```

mod equal_weight;
mod factor_weight;
mod inverse_vol;
mod portfolio;
mod selector;
mod weighter;

// Re-export main types
pub use equal_weight::{EqualWeighter, equal_weight};
pub use factor_weight::{FactorWeightConfig, FactorWeighter};
pub use inverse_vol::{InverseVolConfig, InverseVolWeighter};
pub use portfolio::{Portfolio, WEIGHT_TOLERANCE};
pub use selector::{PortfolioSelector, QuantileBand, Selection, SelectionQuery, select};
pub use weighter::{Weighter, WeightingContext, WeightingScheme};
