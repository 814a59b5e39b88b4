//! Temporal regime classification.
//!
//! Every reading falls into exactly one of three regimes relative to a
//! fixed pandemic window whose boundaries are both inclusive on the
//! `during` side.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};
use crate::parser::StationReading;

/// Temporal bucket of a reading. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Pre,
    During,
    Post,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Pre => "pre",
            Regime::During => "during",
            Regime::Post => "post",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized reading tagged with its regime and calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub usage_pct: f64,
    pub timestamp: NaiveDateTime,
    pub regime: Regime,
    pub date: NaiveDate,
}

/// Assigns regimes from two fixed boundary instants.
#[derive(Debug, Clone, Copy)]
pub struct RegimeClassifier {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl RegimeClassifier {
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `start` is after `end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(PipelineError::Config(format!(
                "pandemic start {start} is after pandemic end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn classify(&self, timestamp: NaiveDateTime) -> Regime {
        if timestamp < self.start {
            Regime::Pre
        } else if timestamp > self.end {
            Regime::Post
        } else {
            Regime::During
        }
    }

    /// Tags a reading with its regime and truncated date.
    pub fn classify_reading(&self, reading: StationReading) -> CanonicalRecord {
        CanonicalRecord {
            regime: self.classify(reading.timestamp),
            date: reading.timestamp.date(),
            station: reading.station,
            lat: reading.lat,
            lon: reading.lon,
            usage_pct: reading.usage_pct,
            timestamp: reading.timestamp,
        }
    }

    pub fn classify_all(&self, readings: Vec<StationReading>) -> Vec<CanonicalRecord> {
        readings
            .into_iter()
            .map(|r| self.classify_reading(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(ts("2020-03-12 00:00:00"), ts("2022-03-31 23:59:59")).unwrap()
    }

    #[test]
    fn test_start_boundary_is_during() {
        let c = classifier();
        assert_eq!(c.classify(ts("2020-03-12 00:00:00")), Regime::During);
        assert_eq!(c.classify(ts("2020-03-11 23:59:59")), Regime::Pre);
    }

    #[test]
    fn test_end_boundary_is_during() {
        let c = classifier();
        assert_eq!(c.classify(ts("2022-03-31 23:59:59")), Regime::During);
        assert_eq!(c.classify(ts("2022-04-01 00:00:00")), Regime::Post);
    }

    #[test]
    fn test_zero_width_window() {
        let instant = ts("2021-01-01 12:00:00");
        let c = RegimeClassifier::new(instant, instant).unwrap();
        assert_eq!(c.classify(instant), Regime::During);
        assert_eq!(c.classify(ts("2021-01-01 11:59:59")), Regime::Pre);
        assert_eq!(c.classify(ts("2021-01-01 12:00:01")), Regime::Post);
    }

    #[test]
    fn test_rejects_inverted_window() {
        let result = RegimeClassifier::new(ts("2022-01-01 00:00:00"), ts("2020-01-01 00:00:00"));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_regimes_order_chronologically() {
        assert!(Regime::Pre < Regime::During);
        assert!(Regime::During < Regime::Post);
        assert_eq!(Regime::During.to_string(), "during");
    }

    #[test]
    fn test_classify_reading_truncates_date() {
        let reading = StationReading {
            station: "Smithfield".to_string(),
            lat: 53.3477,
            lon: -6.2782,
            usage_pct: 25.0,
            timestamp: ts("2019-06-30 23:45:10"),
        };
        let record = classifier().classify_reading(reading);
        assert_eq!(record.regime, Regime::Pre);
        assert_eq!(record.date.to_string(), "2019-06-30");
        assert_eq!(record.station, "Smithfield");
    }
}
