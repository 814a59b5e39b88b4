//! Row types of the aggregate tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::output::Table;
use crate::regime::Regime;

/// Usage statistics for one `(date, regime)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRow {
    pub date: NaiveDate,
    pub regime: Regime,
    pub average_usage: f64,
    pub std_dev_usage: f64,
    pub sem_usage: f64,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub month: u32,
}

impl Table for DateRow {
    const SUFFIX: &'static str = "date";
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "regime",
        "average_usage",
        "std_dev_usage",
        "sem_usage",
        "day_of_week",
        "day_of_month",
        "month",
    ];
}

/// Usage statistics for one `(station, lat, lon, regime)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRow {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub regime: Regime,
    pub average_usage: f64,
    pub std_dev_usage: f64,
    pub sem_usage: f64,
}

impl Table for StationRow {
    const SUFFIX: &'static str = "station";
    const COLUMNS: &'static [&'static str] = &[
        "station",
        "lat",
        "lon",
        "regime",
        "average_usage",
        "std_dev_usage",
        "sem_usage",
    ];
}

/// Usage statistics for one `(date, hour, regime)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourRow {
    pub date: NaiveDate,
    /// 0..=23.
    pub hour: u32,
    pub regime: Regime,
    pub average_usage: f64,
    pub std_dev_usage: f64,
    pub sem_usage: f64,
}

impl Table for HourRow {
    const SUFFIX: &'static str = "hour";
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "hour",
        "regime",
        "average_usage",
        "std_dev_usage",
        "sem_usage",
    ];
}

/// The three tables produced from one deduplicated record set.
#[derive(Debug, Clone, Default)]
pub struct AggregateTables {
    pub by_date: Vec<DateRow>,
    pub by_station: Vec<StationRow>,
    pub by_hour: Vec<HourRow>,
}

impl AggregateTables {
    /// First and last day covered by the by-date table.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.by_date.iter().map(|r| r.date).min()?;
        let last = self.by_date.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

/// Counts reported at the end of a pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub files_read: usize,
    pub rows_read: usize,
    pub rows_closed: usize,
    pub duplicates_dropped: usize,
    pub records_aggregated: usize,
    pub date_rows: usize,
    pub station_rows: usize,
    pub hour_rows: usize,
    pub weather_rows: Option<usize>,
}
