//! Error types for criba.
//!
//! Only contract violations and malformed input are errors. Degenerate
//! numeric outcomes (empty selections, zero volatility, too few returns) are
//! carried as NaN or infinity inside the results instead.

use thiserror::Error;

use crate::types::{Date, InstrumentId};

/// The main error type for criba operations.
#[derive(Debug, Error)]
pub enum CribaError {
    /// A date in the trading calendar lacks an observation for an instrument
    /// of the universe.
    #[error("Incomplete panel: no observation for {instrument} on {date}")]
    IncompletePanel {
        /// Instrument missing its observation.
        instrument: InstrumentId,
        /// Date on which the observation is missing.
        date: Date,
    },

    /// More than one observation exists for the same instrument and date.
    #[error("Duplicate observation for {instrument} on {date}")]
    DuplicateObservation {
        /// Instrument with the duplicated observation.
        instrument: InstrumentId,
        /// Date of the duplicated observation.
        date: Date,
    },

    /// Quantile bounds outside `[0, 1]` or `lower > upper`.
    #[error("Invalid quantile range [{lower}, {upper}]: need 0 <= lower <= upper <= 1")]
    InvalidQuantileRange {
        /// Requested lower quantile.
        lower: f64,
        /// Requested upper quantile.
        upper: f64,
    },

    /// A weighting strategy produced weights that break the portfolio invariant.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Error when a required column is missing from the input frame.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error when a factor is not tracked by the panel.
    #[error("Unknown factor: {0}")]
    UnknownFactor(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a date cannot be parsed or represented.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl CribaError {
    /// Whether this error breaks the input contract of a query.
    ///
    /// Contract violations abort the query that raised them. The panel is never
    /// touched, so the query can be retried with corrected parameters.
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::IncompletePanel { .. }
                | Self::DuplicateObservation { .. }
                | Self::InvalidQuantileRange { .. }
                | Self::InvalidWeights(_)
        )
    }
}

impl From<String> for CribaError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CribaError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for criba operations.
pub type Result<T> = std::result::Result<T, CribaError>;
