//! Reporting periods.
//!
//! A reporting period is a pair of calendar dates. Every query the engine
//! issues widens the period to the inclusive datetime range
//! `[start 00:00:00, end 23:59:59]`, matching the host platform's date
//! filter semantics. Parsing is explicit and fallible: a malformed period
//! fails the metric computation instead of silently dropping a filter.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from constructing or parsing a [`Period`].
#[derive(Debug, thiserror::Error)]
pub enum PeriodError {
    #[error("unparseable period boundary '{0}': expected YYYY-MM-DD")]
    Unparseable(String),
    #[error("period end {end} precedes start {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// An inclusive reporting period over calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    /// Creates a period from two dates.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::EndBeforeStart`] when `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if end < start {
            return Err(PeriodError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses a period from two `YYYY-MM-DD` strings.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::Unparseable`] for a boundary that does not
    /// parse, or [`PeriodError::EndBeforeStart`] for an inverted range.
    pub fn parse(start: &str, end: &str) -> Result<Self, PeriodError> {
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
            .map_err(|_| PeriodError::Unparseable(start.to_owned()))?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")
            .map_err(|_| PeriodError::Unparseable(end.to_owned()))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant of the period: start date at 00:00:00.
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Last included instant of the period: end date at 23:59:59.
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.end
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.end.and_time(NaiveTime::MIN))
    }

    /// The inclusive datetime range used for store queries.
    pub fn datetime_range(&self) -> DateTimeRange {
        DateTimeRange {
            start: self.start_datetime(),
            end: self.end_datetime(),
        }
    }

    /// Whether a datetime falls within the period's inclusive bounds.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.datetime_range().contains(at)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An inclusive datetime range, the unit of all store date filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateTimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Inclusive at both ends.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}
