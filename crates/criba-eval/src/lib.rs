//! Return derivation, benchmark construction and performance evaluation.
//!
//! This crate turns a [`Panel`](criba_traits::Panel) into numbers:
//! - per-instrument simple return series ([`derive_returns`])
//! - a buy-and-hold benchmark index with fixed initial share counts ([`build_index`])
//! - mean return, volatility, Sharpe ratio and 5% Value-at-Risk of a
//!   weighted portfolio ([`PerformanceEvaluator`])
//! - the [`Backtest`] pipeline tying selection, weighting and evaluation
//!   together, including parallel evaluation of many configurations
//!
//! # Example
//!
//! ```rust,ignore
//! use criba_eval::{Backtest, BacktestConfig};
//!
//! let backtest = Backtest::new(&panel)?;
//! let benchmark = backtest.benchmark(Some(config.window_start));
//! let outcome = backtest.run(&config)?;
//! println!("Sharpe: {:.3} vs {:.3}", outcome.report.sharpe_ratio, benchmark.report.sharpe_ratio);
//! ```

pub mod backtest;
pub mod index;
pub mod performance;
pub mod returns;

// Re-export main types
pub use backtest::{Backtest, BacktestConfig, BacktestOutcome, BenchmarkOutcome};
pub use index::{BASE_INVESTMENT, IndexPoint, IndexSeries, build_index};
pub use performance::{
    MissingReturnPolicy, PerformanceEvaluator, PerformanceReport, VAR_LEVEL, evaluate,
    reports_to_frame,
};
pub use returns::{derive_returns, simple_returns};
