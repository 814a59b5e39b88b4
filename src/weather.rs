//! Daily weather observations.
//!
//! The weather export starts with a fixed-length free-text preamble, then a
//! CSV body whose header repeats some indicator columns. Only `date`,
//! `mint`, `maxt` and `rain` are read. The export marks missing values with
//! blanks, so numeric fields that fail to parse become `NaN` rather than
//! aborting the run.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::output::Table;

const DATE_FORMATS: &[&str] = &["%d-%b-%Y", "%Y-%m-%d"];

/// One day of weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub date: NaiveDate,
    /// Minimum air temperature, °C.
    pub min_temp: f64,
    /// Maximum air temperature, °C.
    pub max_temp: f64,
    /// Precipitation, mm.
    pub rain: f64,
}

impl Table for WeatherObservation {
    const SUFFIX: &'static str = "weather";
    const COLUMNS: &'static [&'static str] = &["date", "min_temp", "max_temp", "rain"];
}

pub fn parse_weather_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

fn lenient_f64(s: &str) -> f64 {
    s.parse().unwrap_or(f64::NAN)
}

/// Loads the weather file at `path`, skipping `preamble_lines` lines first.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_weather(path: &Path, preamble_lines: usize) -> Result<Vec<WeatherObservation>> {
    let file = File::open(path)?;
    let observations = read_weather(file, preamble_lines, &path.display().to_string())?;
    debug!(rows = observations.len(), "Weather file loaded");
    Ok(observations)
}

/// Reads weather observations from any reader. `source` names the input in errors.
pub fn read_weather<R: Read>(
    reader: R,
    preamble_lines: usize,
    source: &str,
) -> Result<Vec<WeatherObservation>> {
    let mut reader = BufReader::new(reader);
    let mut skipped = String::new();
    for _ in 0..preamble_lines {
        skipped.clear();
        if reader.read_line(&mut skipped)? == 0 {
            return Err(PipelineError::schema(
                source,
                format!("file ends inside the {preamble_lines}-line preamble"),
            ));
        }
    }

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::schema(source, format!("missing weather column {name}")))
    };
    let (date_idx, mint_idx, maxt_idx, rain_idx) =
        (column("date")?, column("mint")?, column("maxt")?, column("rain")?);

    let get = |record: &StringRecord, idx: usize| record.get(idx).unwrap_or("").to_string();

    let mut observations = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let raw_date = get(&record, date_idx);
        let date = parse_weather_date(&raw_date).ok_or_else(|| {
            // Lines are counted from the CSV header, so add the skipped preamble.
            let line = record.position().map(|p| p.line()).unwrap_or(0) + preamble_lines as u64;
            PipelineError::type_parse(source, line, "date", &raw_date)
        })?;

        observations.push(WeatherObservation {
            date,
            min_temp: lenient_f64(&get(&record, mint_idx)),
            max_temp: lenient_f64(&get(&record, maxt_idx)),
            rain: lenient_f64(&get(&record, rain_idx)),
        });
    }

    Ok(observations)
}

/// Keeps observations dated within `first..=last`.
pub fn clip_to_range(
    observations: Vec<WeatherObservation>,
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<WeatherObservation> {
    observations
        .into_iter()
        .filter(|o| o.date >= first && o.date <= last)
        .collect()
}
