//! Common types used throughout criba.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CribaError, Result};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// Instrument identifier, typically a ticker such as `"AAPL"`.
pub type InstrumentId = String;

/// Days between 0001-01-01 (CE) and the Unix epoch.
///
/// Polars stores `Date` values as days since the Unix epoch while chrono
/// counts from the common era.
pub const CE_TO_UNIX_EPOCH_DAYS: i32 = 719_163;

/// Parse a date string in `YYYY-MM-DD` format.
pub fn parse_date(date_str: &str) -> Result<Date> {
    Date::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| CribaError::InvalidDate(format!("{date_str}: {e}")))
}

/// One row of the panel: an instrument's close price and factor values on a date.
///
/// # Example
///
/// ```
/// use criba_traits::{Date, Observation};
///
/// let obs = Observation::new("AAPL", Date::from_ymd_opt(2021, 1, 29).unwrap(), 131.96)
///     .with_factor("p2b", 31.4);
/// assert_eq!(obs.factor("p2b"), Some(31.4));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Instrument identifier.
    pub instrument: InstrumentId,
    /// Observation date.
    pub date: Date,
    /// Close price.
    pub close: f64,
    /// Factor values keyed by factor name.
    pub factors: BTreeMap<String, f64>,
}

impl Observation {
    /// Create an observation without factor values.
    pub fn new(instrument: impl Into<InstrumentId>, date: Date, close: f64) -> Self {
        Self {
            instrument: instrument.into(),
            date,
            close,
            factors: BTreeMap::new(),
        }
    }

    /// Attach a factor value.
    #[must_use]
    pub fn with_factor(mut self, name: impl Into<String>, value: f64) -> Self {
        self.factors.insert(name.into(), value);
        self
    }

    /// Value of a factor, if tracked for this observation.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }
}

/// Period-over-period simple returns of one instrument, ordered by date.
///
/// The first observed date of an instrument has no prior price, so it never
/// appears here: undefined returns are dropped, not imputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<Date>,
    returns: Vec<f64>,
}

impl ReturnSeries {
    /// Create a return series from parallel date and return vectors.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::InvalidData`] if the lengths differ or the dates
    /// are not strictly increasing.
    pub fn new(dates: Vec<Date>, returns: Vec<f64>) -> Result<Self> {
        if dates.len() != returns.len() {
            return Err(CribaError::InvalidData(format!(
                "return series has {} dates but {} returns",
                dates.len(),
                returns.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CribaError::InvalidData(
                "return series dates must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { dates, returns })
    }

    /// Create a return series from vectors the caller built in date order.
    ///
    /// The lengths must match and the dates must be strictly increasing;
    /// this is only checked in debug builds.
    pub fn from_sorted(dates: Vec<Date>, returns: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), returns.len(), "misaligned return series");
        debug_assert!(
            dates.windows(2).all(|w| w[0] < w[1]),
            "return series dates must be strictly increasing"
        );
        Self { dates, returns }
    }

    /// Dates carrying a defined return.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Returns, aligned with [`Self::dates`].
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Number of defined returns.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series holds no returns.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Return on `date`, if defined.
    pub fn get(&self, date: Date) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.returns[idx])
    }

    /// Iterate over `(date, return)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.dates.iter().copied().zip(self.returns.iter().copied())
    }

    /// The part of the series strictly after `date`.
    #[must_use]
    pub fn after(&self, date: Date) -> Self {
        let start = self.dates.partition_point(|d| *d <= date);
        Self {
            dates: self.dates[start..].to_vec(),
            returns: self.returns[start..].to_vec(),
        }
    }
}
