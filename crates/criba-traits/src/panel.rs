//! The immutable observation panel.
//!
//! A [`Panel`] holds one observation per (instrument, date): a close price and
//! the values of every tracked factor. It is built once, validated for
//! duplicates, and never mutated afterwards, so any number of queries can read
//! it concurrently. Restrictions such as [`Panel::after`] produce new panels.
//!
//! # Expected frame schema
//!
//! [`Panel::from_frame`] reads a long-format Polars `DataFrame`:
//! - `symbol`: instrument identifier
//! - `date`: `Date` column or `YYYY-MM-DD` strings
//! - `close`: close price
//! - every other numeric column is a factor (e.g. `p2b`, `d2e`, `vol_1m`, `mkt_cap`)

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use polars::prelude::*;
use tracing::debug;

use crate::types::{CE_TO_UNIX_EPOCH_DAYS, Date, InstrumentId, Observation, parse_date};
use crate::{CribaError, Result};

/// Column holding the instrument identifier.
pub const SYMBOL_COLUMN: &str = "symbol";
/// Column holding the observation date.
pub const DATE_COLUMN: &str = "date";
/// Column holding the close price.
pub const CLOSE_COLUMN: &str = "close";

#[derive(Debug, Clone, Copy)]
struct Record {
    instrument: usize,
    date: usize,
    close: f64,
}

#[derive(Debug)]
struct RawRow {
    instrument: InstrumentId,
    date: Date,
    close: f64,
    factors: Vec<f64>,
}

/// In-memory table of per-(instrument, date) observations.
///
/// Records are stored ordered by date, then instrument. Lookups by date use
/// precomputed spans and lookups by instrument use per-instrument row lists,
/// both already sorted, so iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    dates: Vec<Date>,
    instruments: Vec<InstrumentId>,
    factor_names: Vec<String>,
    records: Vec<Record>,
    // factor_columns[factor][row]
    factor_columns: Vec<Vec<f64>>,
    date_spans: Vec<Range<usize>>,
    by_instrument: Vec<Vec<usize>>,
}

/// Borrowed view of one panel row.
#[derive(Debug, Clone, Copy)]
pub struct ObservationRef<'a> {
    panel: &'a Panel,
    row: usize,
}

impl<'a> ObservationRef<'a> {
    /// Instrument identifier.
    pub fn instrument(&self) -> &'a str {
        &self.panel.instruments[self.panel.records[self.row].instrument]
    }

    /// Observation date.
    pub fn date(&self) -> Date {
        self.panel.dates[self.panel.records[self.row].date]
    }

    /// Close price.
    pub fn close(&self) -> f64 {
        self.panel.records[self.row].close
    }

    /// Value of the factor at position `factor` in [`Panel::factor_names`].
    pub fn factor_at(&self, factor: usize) -> f64 {
        self.panel.factor_columns[factor][self.row]
    }

    /// Value of a named factor, `None` if the panel does not track it.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.panel
            .factor_names
            .iter()
            .position(|f| f == name)
            .map(|idx| self.factor_at(idx))
    }
}

impl Panel {
    /// Build a panel from owned observations.
    ///
    /// The tracked factors are the union of factor names across observations;
    /// an observation lacking one of them holds NaN for it.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::DuplicateObservation`] if an (instrument, date)
    /// pair appears twice.
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Result<Self> {
        let observations: Vec<Observation> = observations.into_iter().collect();
        let factor_names: Vec<String> = observations
            .iter()
            .flat_map(|obs| obs.factors.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = observations
            .into_iter()
            .map(|obs| RawRow {
                factors: factor_names
                    .iter()
                    .map(|name| obs.factor(name).unwrap_or(f64::NAN))
                    .collect(),
                instrument: obs.instrument,
                date: obs.date,
                close: obs.close,
            })
            .collect();

        Self::assemble(rows, factor_names)
    }

    /// Build a panel from a long-format Polars `DataFrame`.
    ///
    /// Null prices and factor values become NaN; imputing them is the data
    /// provider's job.
    ///
    /// # Errors
    ///
    /// Returns an error if a key column is missing, a date cannot be parsed,
    /// or an (instrument, date) pair is duplicated.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        for required in [SYMBOL_COLUMN, DATE_COLUMN, CLOSE_COLUMN] {
            if df.column(required).is_err() {
                return Err(CribaError::MissingColumn(required.to_string()));
            }
        }

        let symbols = symbol_values(df)?;
        let dates = date_values(df)?;
        let closes = float_values(df, CLOSE_COLUMN)?;

        let mut factor_names = Vec::new();
        let mut factor_columns = Vec::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if [SYMBOL_COLUMN, DATE_COLUMN, CLOSE_COLUMN].contains(&name) {
                continue;
            }
            if !is_numeric(column.dtype()) {
                debug!(column = name, dtype = %column.dtype(), "skipping non-numeric column");
                continue;
            }
            factor_names.push(name.to_string());
            factor_columns.push(float_values(df, name)?);
        }

        let rows = symbols
            .into_iter()
            .zip(dates)
            .zip(closes)
            .enumerate()
            .map(|(row, ((instrument, date), close))| RawRow {
                instrument,
                date,
                close,
                factors: factor_columns.iter().map(|col| col[row]).collect(),
            })
            .collect();

        Self::assemble(rows, factor_names)
    }

    fn assemble(mut rows: Vec<RawRow>, factor_names: Vec<String>) -> Result<Self> {
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.instrument.cmp(&b.instrument)));
        if let Some(pair) = rows
            .windows(2)
            .find(|w| w[0].date == w[1].date && w[0].instrument == w[1].instrument)
        {
            return Err(CribaError::DuplicateObservation {
                instrument: pair[0].instrument.clone(),
                date: pair[0].date,
            });
        }
        Ok(Self::from_sorted(rows, factor_names))
    }

    // Rows must be sorted by (date, instrument) without duplicates.
    fn from_sorted(rows: Vec<RawRow>, factor_names: Vec<String>) -> Self {
        let instruments: Vec<InstrumentId> = rows
            .iter()
            .map(|r| r.instrument.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let instrument_ids: HashMap<&str, usize> = instruments
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();

        let mut dates: Vec<Date> = Vec::new();
        let mut date_spans: Vec<Range<usize>> = Vec::new();
        let mut records = Vec::with_capacity(rows.len());
        let mut factor_columns = vec![Vec::with_capacity(rows.len()); factor_names.len()];
        let mut by_instrument = vec![Vec::new(); instruments.len()];

        for (row_idx, row) in rows.iter().enumerate() {
            if dates.last() != Some(&row.date) {
                dates.push(row.date);
                date_spans.push(row_idx..row_idx);
            }
            if let Some(span) = date_spans.last_mut() {
                span.end = row_idx + 1;
            }
            let instrument = instrument_ids[row.instrument.as_str()];
            records.push(Record {
                instrument,
                date: dates.len() - 1,
                close: row.close,
            });
            for (column, value) in factor_columns.iter_mut().zip(&row.factors) {
                column.push(*value);
            }
            by_instrument[instrument].push(row_idx);
        }

        debug!(
            rows = records.len(),
            dates = dates.len(),
            instruments = instruments.len(),
            factors = factor_names.len(),
            "panel assembled"
        );

        Self {
            dates,
            instruments,
            factor_names,
            records,
            factor_columns,
            date_spans,
            by_instrument,
        }
    }

    /// Distinct dates, ascending.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Distinct instruments, sorted.
    pub fn instruments(&self) -> &[InstrumentId] {
        &self.instruments
    }

    /// Names of the tracked factors.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Earliest date in the panel.
    pub fn min_date(&self) -> Option<Date> {
        self.dates.first().copied()
    }

    /// Latest date in the panel.
    pub fn max_date(&self) -> Option<Date> {
        self.dates.last().copied()
    }

    /// Number of observations.
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the panel holds no observations.
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a factor in [`Self::factor_names`].
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::UnknownFactor`] if the factor is not tracked.
    pub fn factor_index(&self, name: &str) -> Result<usize> {
        self.factor_names
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| CribaError::UnknownFactor(name.to_string()))
    }

    fn date_index(&self, date: Date) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    fn instrument_index(&self, instrument: &str) -> Option<usize> {
        self.instruments
            .binary_search_by(|id| id.as_str().cmp(instrument))
            .ok()
    }

    fn row(&self, instrument: &str, date: Date) -> Option<usize> {
        let instrument = self.instrument_index(instrument)?;
        let span = self.date_spans[self.date_index(date)?].clone();
        let offset = self.records[span.clone()]
            .binary_search_by_key(&instrument, |r| r.instrument)
            .ok()?;
        Some(span.start + offset)
    }

    /// Observation of `instrument` on `date`.
    pub fn get(&self, instrument: &str, date: Date) -> Option<ObservationRef<'_>> {
        self.row(instrument, date)
            .map(|row| ObservationRef { panel: self, row })
    }

    /// Close price of `instrument` on `date`.
    pub fn close(&self, instrument: &str, date: Date) -> Option<f64> {
        self.get(instrument, date).map(|obs| obs.close())
    }

    /// Value of factor `name` for `instrument` on `date`.
    pub fn factor(&self, instrument: &str, date: Date, name: &str) -> Option<f64> {
        self.get(instrument, date).and_then(|obs| obs.factor(name))
    }

    /// Observations on `date`, ordered by instrument. Empty if the date is absent.
    pub fn observations_on(&self, date: Date) -> impl Iterator<Item = ObservationRef<'_>> {
        let span = self
            .date_index(date)
            .map(|idx| self.date_spans[idx].clone())
            .unwrap_or(0..0);
        span.map(move |row| ObservationRef { panel: self, row })
    }

    /// Observations of `instrument`, ordered by date. Empty if unknown.
    pub fn history(&self, instrument: &str) -> impl Iterator<Item = ObservationRef<'_>> {
        self.instrument_index(instrument)
            .map_or(&[][..], |idx| self.by_instrument[idx].as_slice())
            .iter()
            .map(move |&row| ObservationRef { panel: self, row })
    }

    /// A new panel holding only observations dated strictly after `date`.
    ///
    /// Instruments with no remaining observation leave the universe.
    #[must_use]
    pub fn after(&self, date: Date) -> Self {
        self.tail(self.dates.partition_point(|d| *d <= date))
    }

    /// A new panel holding only observations dated on or after `date`.
    #[must_use]
    pub fn starting_at(&self, date: Date) -> Self {
        self.tail(self.dates.partition_point(|d| *d < date))
    }

    fn tail(&self, first_date: usize) -> Self {
        let first_row = self
            .date_spans
            .get(first_date)
            .map_or(self.records.len(), |s| s.start);
        let rows = (first_row..self.records.len())
            .map(|row| self.raw_row(row))
            .collect();
        Self::from_sorted(rows, self.factor_names.clone())
    }

    fn raw_row(&self, row: usize) -> RawRow {
        let record = self.records[row];
        RawRow {
            instrument: self.instruments[record.instrument].clone(),
            date: self.dates[record.date],
            close: record.close,
            factors: self.factor_columns.iter().map(|col| col[row]).collect(),
        }
    }

    /// Owned copies of every observation, ordered by date then instrument.
    pub fn to_observations(&self) -> Vec<Observation> {
        (0..self.records.len())
            .map(|row| {
                let raw = self.raw_row(row);
                Observation {
                    instrument: raw.instrument,
                    date: raw.date,
                    close: raw.close,
                    factors: self.factor_names.iter().cloned().zip(raw.factors).collect(),
                }
            })
            .collect()
    }

    /// Check that every date carries exactly one observation per instrument
    /// of the universe.
    ///
    /// # Errors
    ///
    /// Returns [`CribaError::IncompletePanel`] naming the first missing
    /// (instrument, date) pair in date order.
    pub fn check_completeness(&self) -> Result<()> {
        let universe = self.instruments.len();
        for (date_idx, span) in self.date_spans.iter().enumerate() {
            if span.len() == universe {
                continue;
            }
            let present: Vec<usize> = self.records[span.clone()]
                .iter()
                .map(|r| r.instrument)
                .collect();
            let missing = (0..universe)
                .find(|idx| present.binary_search(idx).is_err())
                .unwrap_or_default();
            return Err(CribaError::IncompletePanel {
                instrument: self.instruments[missing].clone(),
                date: self.dates[date_idx],
            });
        }
        Ok(())
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    )
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(values)
}

fn symbol_values(df: &DataFrame) -> Result<Vec<InstrumentId>> {
    df.column(SYMBOL_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|s| {
            s.map(str::to_string)
                .ok_or_else(|| CribaError::InvalidData("null symbol".to_string()))
        })
        .collect()
}

fn date_values(df: &DataFrame) -> Result<Vec<Date>> {
    let column = df.column(DATE_COLUMN)?;
    match column.dtype() {
        DataType::Date => column
            .as_materialized_series()
            .date()?
            .into_iter()
            .map(|d: Option<i32>| {
                d.and_then(|days| Date::from_num_days_from_ce_opt(days + CE_TO_UNIX_EPOCH_DAYS))
                    .ok_or_else(|| CribaError::InvalidDate("null or out-of-range date".to_string()))
            })
            .collect(),
        DataType::String => column
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|s| match s {
                Some(s) => parse_date(s),
                None => Err(CribaError::InvalidDate("null date".to_string())),
            })
            .collect(),
        other => Err(CribaError::InvalidData(format!(
            "date column has unsupported type {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(month: u32) -> Date {
        Date::from_ymd_opt(2020, month, 28).unwrap()
    }

    fn sample() -> Panel {
        Panel::from_observations(vec![
            Observation::new("B", d(2), 21.0).with_factor("p2b", 2.0),
            Observation::new("A", d(1), 10.0).with_factor("p2b", 1.0),
            Observation::new("B", d(1), 20.0).with_factor("p2b", 3.0),
            Observation::new("A", d(2), 11.0).with_factor("p2b", 1.5),
            Observation::new("A", d(3), 12.0).with_factor("p2b", 1.2),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_observations_orders_rows() {
        let panel = sample();
        assert_eq!(panel.len(), 5);
        assert_eq!(panel.dates(), &[d(1), d(2), d(3)]);
        assert_eq!(panel.instruments(), &["A".to_string(), "B".to_string()]);
        assert_eq!(panel.factor_names(), &["p2b".to_string()]);
        assert_eq!(panel.min_date(), Some(d(1)));
        assert_eq!(panel.max_date(), Some(d(3)));

        let on_first: Vec<&str> = panel.observations_on(d(1)).map(|o| o.instrument()).collect();
        assert_eq!(on_first, vec!["A", "B"]);

        let history: Vec<f64> = panel.history("A").map(|o| o.close()).collect();
        assert_eq!(history, vec![10.0, 11.0, 12.0]);
        assert_eq!(panel.history("ZZZ").count(), 0);
    }

    #[test]
    fn test_point_lookups() {
        let panel = sample();
        assert_eq!(panel.close("B", d(2)), Some(21.0));
        assert_eq!(panel.close("B", d(3)), None);
        assert_eq!(panel.factor("A", d(2), "p2b"), Some(1.5));
        assert_eq!(panel.factor("A", d(2), "d2e"), None);
        assert_eq!(panel.factor_index("p2b").unwrap(), 0);
        assert!(matches!(
            panel.factor_index("d2e"),
            Err(CribaError::UnknownFactor(_))
        ));
    }

    #[test]
    fn test_missing_factor_key_becomes_nan() {
        let panel = Panel::from_observations(vec![
            Observation::new("A", d(1), 10.0).with_factor("p2b", 1.0),
            Observation::new("B", d(1), 20.0).with_factor("d2e", 0.5),
        ])
        .unwrap();
        assert_eq!(panel.factor_names(), &["d2e".to_string(), "p2b".to_string()]);
        assert!(panel.factor("A", d(1), "d2e").unwrap().is_nan());
        assert_eq!(panel.factor("B", d(1), "d2e"), Some(0.5));
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let result = Panel::from_observations(vec![
            Observation::new("A", d(1), 10.0),
            Observation::new("A", d(1), 10.5),
        ]);
        assert!(matches!(
            result,
            Err(CribaError::DuplicateObservation { ref instrument, .. }) if instrument == "A"
        ));
    }

    #[test]
    fn test_check_completeness() {
        let panel = sample();
        match panel.check_completeness() {
            Err(CribaError::IncompletePanel { instrument, date }) => {
                assert_eq!(instrument, "B");
                assert_eq!(date, d(3));
            }
            other => panic!("expected incomplete panel, got {other:?}"),
        }

        assert!(panel.after(d(1)).check_completeness().is_err());
        assert!(Panel::default().check_completeness().is_ok());
    }

    #[test]
    fn test_after_leaves_original_untouched() {
        let panel = sample();
        let tail = panel.after(d(1));
        assert_eq!(tail.dates(), &[d(2), d(3)]);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.close("A", d(3)), Some(12.0));
        assert_eq!(tail.factor("B", d(2), "p2b"), Some(2.0));

        let last = panel.after(d(2));
        assert_eq!(last.instruments(), &["A".to_string()]);
        assert!(last.check_completeness().is_ok());

        assert!(panel.after(d(3)).is_empty());
        assert_eq!(panel.len(), 5);
    }

    #[test]
    fn test_starting_at_is_inclusive() {
        let panel = sample();
        assert_eq!(panel.starting_at(d(2)).dates(), &[d(2), d(3)]);
        assert_eq!(panel.starting_at(d(1)).len(), panel.len());
        // A date between panel dates behaves like `after`.
        let mid = Date::from_ymd_opt(2020, 2, 1).unwrap();
        assert_eq!(panel.starting_at(mid).dates(), panel.after(mid).dates());
    }

    #[test]
    fn test_to_observations_round_trip() {
        let panel = sample();
        let rebuilt = Panel::from_observations(panel.to_observations()).unwrap();
        assert_eq!(rebuilt.dates(), panel.dates());
        assert_eq!(rebuilt.close("A", d(3)), Some(12.0));
    }

    #[test]
    fn test_from_frame_with_string_dates() {
        let df = df! {
            "symbol" => &["A", "B", "A", "B"],
            "date" => &["2020-01-31", "2020-01-31", "2020-02-29", "2020-02-29"],
            "close" => &[10.0, 20.0, 11.0, 18.0],
            "p2b" => &[Some(1.0), Some(2.0), None, Some(2.5)],
            "sector" => &["tech", "energy", "tech", "energy"],
        }
        .unwrap();

        let panel = Panel::from_frame(&df).unwrap();
        assert_eq!(panel.len(), 4);
        assert_eq!(panel.factor_names(), &["p2b".to_string()]);
        let feb = Date::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(panel.close("B", feb), Some(18.0));
        assert!(panel.factor("A", feb, "p2b").unwrap().is_nan());
        assert!(panel.check_completeness().is_ok());
    }

    #[test]
    fn test_from_frame_missing_column() {
        let df = df! {
            "symbol" => &["A"],
            "close" => &[10.0],
        }
        .unwrap();
        assert!(matches!(
            Panel::from_frame(&df),
            Err(CribaError::MissingColumn(ref c)) if c == "date"
        ));
    }
}
