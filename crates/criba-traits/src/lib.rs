#![doc(issue_tracker_base_url = "https://github.com/factordynamics/criba/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core definitions for the criba factor backtester.
//!
//! This crate holds the pieces every other criba crate reads from: the
//! immutable [`Panel`] of per-instrument, per-date observations, the value
//! types derived from it, the error taxonomy, and the statistics shared by
//! the selector and the performance evaluator.

/// The version of the criba-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod error;
pub mod panel;
pub mod stats;
pub mod types;

// Re-exports
pub use error::{CribaError, Result};
pub use panel::{ObservationRef, Panel};
pub use types::{Date, InstrumentId, Observation, ReturnSeries};
