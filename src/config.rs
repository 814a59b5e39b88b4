use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::regime::RegimeClassifier;

/// Run configuration for the aggregation pipeline.
///
/// Stored as a plain JSON object on disk; every field is optional:
/// ```json
/// {
///   "pandemic_start": "2020-03-12 00:00:00",
///   "pandemic_end": "2022-03-31 23:59:59",
///   "output_prefix": "dublinbikes_data_agg",
///   "weather_preamble_lines": 12
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// First instant of the `during` regime (inclusive).
    #[serde(with = "boundary_format")]
    pub pandemic_start: NaiveDateTime,
    /// Last instant of the `during` regime (inclusive).
    #[serde(with = "boundary_format")]
    pub pandemic_end: NaiveDateTime,
    /// File-name prefix of the output tables, e.g. `<prefix>-date.csv`.
    pub output_prefix: String,
    /// Number of free-text lines preceding the weather file's header row.
    pub weather_preamble_lines: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pandemic_start: at(2020, 3, 12, 0, 0, 0),
            pandemic_end: at(2022, 3, 31, 23, 59, 59),
            output_prefix: "dublinbikes_data_agg".to_string(),
            weather_preamble_lines: 12,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Builds the classifier for the configured regime boundaries.
    pub fn classifier(&self) -> Result<RegimeClassifier> {
        RegimeClassifier::new(self.pandemic_start, self.pandemic_end)
    }

    /// Output file name for the table with the given suffix (`date`, `station`, ...).
    pub fn output_file(&self, suffix: &str) -> String {
        if self.output_prefix.is_empty() {
            format!("{suffix}.csv")
        } else {
            format!("{}-{}.csv", self.output_prefix, suffix)
        }
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .unwrap_or_default()
}

mod boundary_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, de};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(de::Error::custom)
    }
}
