#![doc(issue_tracker_base_url = "https://github.com/factordynamics/criba/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # criba
//!
//! Factor-quantile equity portfolio backtesting.
//!
//! criba is an umbrella crate that re-exports all criba sub-crates for
//! convenience. It answers one question: if stocks had been sorted by a
//! factor and a slice of them held over an evaluation window, how would that
//! have performed versus holding everything?
//!
//! ## Quick Start
//!
//! ```no_run
//! use criba::prelude::*;
//!
//! # fn example(panel: &Panel) -> Result<()> {
//! let backtest = Backtest::new(panel)?;
//! let config = BacktestConfig {
//!     factor: "p2b".to_string(),
//!     lower_quantile: 0.0,
//!     upper_quantile: 0.2,
//!     ..Default::default()
//! };
//!
//! let benchmark = backtest.benchmark(Some(config.window_start));
//! let outcome = backtest.run(&config)?;
//! println!(
//!     "{}: Sharpe {:.3} vs benchmark {:.3}",
//!     outcome.label, outcome.report.sharpe_ratio, benchmark.report.sharpe_ratio
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Panel, observations, return series, errors and statistics
//! - [`select`] - Quantile-band selection and weighting strategies
//! - [`eval`] - Returns, benchmark index, performance and the backtest pipeline
//!
//! ## Architecture
//!
//! 1. A **Panel** holds one immutable observation per instrument and date
//! 2. The **ReturnDeriver** turns closes into per-instrument return series
//! 3. The **IndexBuilder** values fixed initial share counts into a benchmark
//! 4. The **PortfolioSelector** keeps instruments inside a factor quantile band
//! 5. A **Weighter** turns the selection into a fully invested portfolio
//! 6. The **PerformanceEvaluator** reports mean, volatility, Sharpe and VaR

/// Version information for the criba crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Types
// ============================================================================

/// Core data types for criba.
///
/// - [`Panel`] - Immutable per-(instrument, date) observation table
/// - [`ReturnSeries`] - Dated period returns of one instrument
/// - [`CribaError`] - Error type shared by all crates
pub mod traits {
    pub use criba_traits::*;
}

pub use criba_traits::{CribaError, Result};
pub use criba_traits::{Date, InstrumentId, Observation, Panel, ReturnSeries};

// ============================================================================
// Selection and Weighting
// ============================================================================

/// Quantile-band selection and weighting strategies.
///
/// ## Available Weighters
///
/// - **EqualWeighter**: `1/N` per selected instrument
/// - **FactorWeighter**: proportional to the window-mean factor value
/// - **InverseVolWeighter**: proportional to inverse return volatility
pub mod select {
    pub use criba_select::*;
}

pub use criba_select::{Portfolio, Weighter};

// ============================================================================
// Evaluation
// ============================================================================

/// Returns, benchmark index, performance evaluation and backtesting.
///
/// ## Evaluation Metrics
///
/// ```text
/// average_return = mean(r)
/// volatility     = std(r), N - 1 denominator
/// sharpe_ratio   = average_return / volatility
/// VaR 5%         = type-7 quantile of r at 0.05
/// ```
///
/// Degenerate inputs give NaN or infinite statistics, never errors.
pub mod eval {
    pub use criba_eval::*;
}

pub use criba_eval::{Backtest, BacktestConfig, PerformanceReport};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```
/// use criba::prelude::*;
/// ```
pub mod prelude {
    pub use crate::eval::{
        Backtest, BacktestConfig, BacktestOutcome, IndexSeries, MissingReturnPolicy,
        PerformanceEvaluator, PerformanceReport, build_index, derive_returns,
    };
    pub use crate::select::{
        FactorWeightConfig, InverseVolConfig, Portfolio, PortfolioSelector, QuantileBand,
        SelectionQuery, Weighter, WeightingScheme, equal_weight, select,
    };
    pub use crate::traits::{CribaError, Date, InstrumentId, Observation, Panel, Result, ReturnSeries};
}
