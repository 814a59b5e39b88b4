//! Schema normalization for raw station-reading files.
//!
//! Two source layouts are known: the bulk CSV download from the open-data
//! portal (upper-case headers) and files harvested from the live API
//! (snake_case headers). Both are renamed onto the download layout's
//! column names, filtered to open stations and type-checked.

use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

const TIME: &str = "TIME";
const CAPACITY: &str = "BIKE STANDS";
const AVAILABLE: &str = "AVAILABLE BIKE STANDS";
const STATUS: &str = "STATUS";
const STATION: &str = "ADDRESS";
const LATITUDE: &str = "LATITUDE";
const LONGITUDE: &str = "LONGITUDE";

/// Column renames applied to API-harvested files.
static API_RENAMES: &[(&str, &str)] = &[
    ("harvest_time", TIME),
    ("available_bike_stands", AVAILABLE),
    ("bike_stands", CAPACITY),
    ("status", STATUS),
    ("address", STATION),
    ("latitude", LATITUDE),
    ("longitude", LONGITUDE),
];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Which of the two known layouts a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSchema {
    /// Bulk download: `TIME`, `BIKE STANDS`, `AVAILABLE BIKE STANDS`, ...
    Download,
    /// Live API harvest: `harvest_time`, `bike_stands`, `available_bike_stands`, ...
    Api,
}

impl SourceSchema {
    /// Identifies the layout from a header row, by its timestamp column.
    pub fn detect(headers: &StringRecord) -> Option<Self> {
        if headers.iter().any(|h| h == "harvest_time") {
            Some(SourceSchema::Api)
        } else if headers.iter().any(|h| h == TIME) {
            Some(SourceSchema::Download)
        } else {
            None
        }
    }

    /// Maps a header onto its canonical name.
    pub fn canonical_name<'a>(&self, header: &'a str) -> &'a str {
        match self {
            SourceSchema::Download => header,
            SourceSchema::Api => API_RENAMES
                .iter()
                .find(|(from, _)| *from == header)
                .map(|(_, to)| *to)
                .unwrap_or(header),
        }
    }
}

impl fmt::Display for SourceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSchema::Download => f.write_str("download"),
            SourceSchema::Api => f.write_str("api"),
        }
    }
}

/// Positions of the required columns within a file's records.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    time: usize,
    capacity: usize,
    available: usize,
    status: usize,
    station: usize,
    lat: usize,
    lon: usize,
}

impl ColumnIndex {
    fn resolve(schema: SourceSchema, headers: &StringRecord, source: &str) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| schema.canonical_name(h) == name)
                .ok_or_else(|| {
                    PipelineError::schema(source, format!("missing required column {name}"))
                })
        };

        Ok(Self {
            time: find(TIME)?,
            capacity: find(CAPACITY)?,
            available: find(AVAILABLE)?,
            status: find(STATUS)?,
            station: find(STATION)?,
            lat: find(LATITUDE)?,
            lon: find(LONGITUDE)?,
        })
    }
}

/// One typed row of a station file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i64,
    pub available: i64,
    pub status: String,
    pub observed_at: NaiveDateTime,
}

impl RawObservation {
    /// Free stands as a percentage of capacity. Not guarded against a zero
    /// capacity, which yields `inf` or `NaN`.
    pub fn usage_pct(&self) -> f64 {
        self.available as f64 / self.capacity as f64 * 100.0
    }

    pub fn into_reading(self) -> StationReading {
        StationReading {
            usage_pct: self.usage_pct(),
            station: self.station_id,
            lat: self.latitude,
            lon: self.longitude,
            timestamp: self.observed_at,
        }
    }
}

/// A normalized open-station reading, not yet classified.
#[derive(Debug, Clone, PartialEq)]
pub struct StationReading {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub usage_pct: f64,
    pub timestamp: NaiveDateTime,
}

/// Result of normalizing one file.
#[derive(Debug)]
pub struct NormalizedFile {
    pub schema: SourceSchema,
    pub readings: Vec<StationReading>,
    /// Data rows in the file, open or not.
    pub rows_read: usize,
    /// Rows dropped by the open-status filter.
    pub rows_closed: usize,
}

/// Case-insensitive check for the `open` status flag.
pub fn is_open(status: &str) -> bool {
    status.eq_ignore_ascii_case("open")
}

/// Parses a station timestamp in any of the accepted layouts.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Parses a stand count. Integral floats such as `"20.0"` are accepted when
/// they fit an `i64`.
fn parse_count(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// Normalizes a station file at `path`.
///
/// # Errors
///
/// Returns [`PipelineError::Schema`] if the header matches neither layout or
/// lacks a required column, and [`PipelineError::TypeParse`] if an open row
/// holds an unparseable field.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn parse_station_file(path: &Path) -> Result<NormalizedFile> {
    let file = File::open(path)?;
    let normalized = parse_station_reader(file, &path.display().to_string())?;
    debug!(
        schema = %normalized.schema,
        rows = normalized.rows_read,
        closed = normalized.rows_closed,
        "Station file normalized"
    );
    Ok(normalized)
}

/// Normalizes station readings from any reader. `source` names the input in errors.
pub fn parse_station_reader<R: Read>(reader: R, source: &str) -> Result<NormalizedFile> {
    // Station names and status flags are compared verbatim, so only headers are trimmed.
    let mut rdr = ReaderBuilder::new().trim(Trim::Headers).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let schema = SourceSchema::detect(&headers).ok_or_else(|| {
        PipelineError::schema(source, "header matches neither the download nor the API layout")
    })?;
    let columns = ColumnIndex::resolve(schema, &headers, source)?;

    let mut readings = Vec::new();
    let mut rows_read = 0;
    let mut rows_closed = 0;

    for result in rdr.records() {
        let record = result?;
        rows_read += 1;

        if !is_open(field(&record, columns.status)) {
            rows_closed += 1;
            continue;
        }

        readings.push(parse_row(&record, &columns, source)?.into_reading());
    }

    Ok(NormalizedFile {
        schema,
        readings,
        rows_read,
        rows_closed,
    })
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

/// A timestamp or numeric field, without surrounding padding.
fn value(record: &StringRecord, idx: usize) -> &str {
    field(record, idx).trim()
}

fn parse_row(record: &StringRecord, columns: &ColumnIndex, source: &str) -> Result<RawObservation> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let fail = |column: &str, value: &str| PipelineError::type_parse(source, line, column, value);

    let station = field(record, columns.station);
    if station.is_empty() {
        return Err(fail(STATION, station));
    }

    let raw_time = value(record, columns.time);
    let observed_at = parse_timestamp(raw_time).ok_or_else(|| fail(TIME, raw_time))?;

    let raw_lat = value(record, columns.lat);
    let latitude = raw_lat.parse::<f64>().map_err(|_| fail(LATITUDE, raw_lat))?;

    let raw_lon = value(record, columns.lon);
    let longitude = raw_lon.parse::<f64>().map_err(|_| fail(LONGITUDE, raw_lon))?;

    let raw_capacity = value(record, columns.capacity);
    let capacity = parse_count(raw_capacity).ok_or_else(|| fail(CAPACITY, raw_capacity))?;

    let raw_available = value(record, columns.available);
    let available = parse_count(raw_available).ok_or_else(|| fail(AVAILABLE, raw_available))?;

    Ok(RawObservation {
        station_id: station.to_string(),
        latitude,
        longitude,
        capacity,
        available,
        status: field(record, columns.status).to_string(),
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWNLOAD_HEADER: &str =
        "STATION ID,TIME,LAST UPDATED,NAME,BIKE STANDS,AVAILABLE BIKE STANDS,AVAILABLE BIKES,STATUS,ADDRESS,LATITUDE,LONGITUDE";
    const API_HEADER: &str =
        "number,harvest_time,name,address,latitude,longitude,bike_stands,available_bike_stands,available_bikes,status";

    fn parse(csv: &str) -> Result<NormalizedFile> {
        parse_station_reader(csv.as_bytes(), "test.csv")
    }

    #[test]
    fn test_download_layout() {
        let csv = format!(
            "{DOWNLOAD_HEADER}\n2,2019-07-01 06:30:02,2019-07-01 06:29:41,BLESSINGTON STREET,20,5,15,Open,Blessington Street,53.3568,-6.26814\n"
        );
        let file = parse(&csv).unwrap();

        assert_eq!(file.schema, SourceSchema::Download);
        assert_eq!(file.rows_read, 1);
        assert_eq!(file.readings.len(), 1);

        let r = &file.readings[0];
        assert_eq!(r.station, "Blessington Street");
        assert_eq!(r.usage_pct, 25.0);
        assert_eq!(r.timestamp.to_string(), "2019-07-01 06:30:02");
        assert!((r.lat - 53.3568).abs() < f64::EPSILON);
    }

    #[test]
    fn test_api_layout_is_renamed() {
        let csv = format!(
            "{API_HEADER}\n42,2021-05-04T10:15:00,SMITHFIELD NORTH,Smithfield North,53.3496,-6.2782,30,12,18,OPEN\n"
        );
        let file = parse(&csv).unwrap();

        assert_eq!(file.schema, SourceSchema::Api);
        assert_eq!(file.readings[0].station, "Smithfield North");
        assert!((file.readings[0].usage_pct - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_filter_is_case_insensitive() {
        let csv = format!(
            "{API_HEADER}\n\
             1,2021-05-04 10:00:00,A,A,53.0,-6.0,10,1,9,Open\n\
             2,2021-05-04 10:00:00,B,B,53.0,-6.0,10,1,9,OPEN\n\
             3,2021-05-04 10:00:00,C,C,53.0,-6.0,10,1,9,open\n\
             4,2021-05-04 10:00:00,D,D,53.0,-6.0,10,1,9,Closed\n\
             5,2021-05-04 10:00:00,E,E,53.0,-6.0,10,1,9,CLOSED\n"
        );
        let file = parse(&csv).unwrap();

        let stations: Vec<_> = file.readings.iter().map(|r| r.station.as_str()).collect();
        assert_eq!(stations, vec!["A", "B", "C"]);
        assert_eq!(file.rows_read, 5);
        assert_eq!(file.rows_closed, 2);
    }

    #[test]
    fn test_closed_rows_are_not_type_checked() {
        let csv = format!("{API_HEADER}\n1,garbage,A,A,north,west,ten,one,9,CLOSED\n");
        let file = parse(&csv).unwrap();
        assert!(file.readings.is_empty());
    }

    #[test]
    fn test_unknown_schema_is_error() {
        let err = parse("when,where,how_many\n1,2,3\n").unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn test_missing_column_after_rename() {
        let csv = "harvest_time,address,latitude,longitude,bike_stands,status\n";
        match parse(csv).unwrap_err() {
            PipelineError::Schema { message, .. } => {
                assert!(message.contains("AVAILABLE BIKE STANDS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let csv = format!(
            "{API_HEADER}\n\
             1,2021-05-04 10:00:00,A,A,53.0,-6.0,10,1,9,Open\n\
             2,yesterday,B,B,53.0,-6.0,10,1,9,Open\n"
        );
        match parse(&csv).unwrap_err() {
            PipelineError::TypeParse {
                line, column, value, ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, TIME);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_capacity_is_error() {
        let csv = format!("{API_HEADER}\n1,2021-05-04 10:00:00,A,A,53.0,-6.0,lots,1,9,Open\n");
        assert!(matches!(
            parse(&csv).unwrap_err(),
            PipelineError::TypeParse { column, .. } if column == CAPACITY
        ));
    }

    #[test]
    fn test_empty_station_is_error() {
        let csv = format!("{API_HEADER}\n1,2021-05-04 10:00:00,A,,53.0,-6.0,10,1,9,Open\n");
        assert!(matches!(
            parse(&csv).unwrap_err(),
            PipelineError::TypeParse { column, .. } if column == STATION
        ));
    }

    #[test]
    fn test_zero_capacity_passes_through() {
        let csv = format!(
            "{API_HEADER}\n\
             1,2021-05-04 10:00:00,A,A,53.0,-6.0,0,3,0,Open\n\
             2,2021-05-04 10:00:00,B,B,53.0,-6.0,0,0,0,Open\n"
        );
        let file = parse(&csv).unwrap();
        assert!(file.readings[0].usage_pct.is_infinite());
        assert!(file.readings[1].usage_pct.is_nan());
    }

    #[test]
    fn test_usage_is_not_clamped() {
        let csv = format!("{API_HEADER}\n1,2021-05-04 10:00:00,A,A,53.0,-6.0,10,12,0,Open\n");
        let file = parse(&csv).unwrap();
        assert!((file.readings[0].usage_pct - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        for s in [
            "2020-03-12 00:00:00",
            "2020-03-12T00:00:00",
            "2020/03/12 00:00:00",
            "2020-03-12 00:00:00.000",
            "2020-03-12T00:00:00+00:00",
        ] {
            let ts = parse_timestamp(s).unwrap_or_else(|| panic!("failed on {s}"));
            assert_eq!(ts.to_string(), "2020-03-12 00:00:00");
        }
        assert!(parse_timestamp("12/03/2020").is_none());
    }

    #[test]
    fn test_parse_count_accepts_integral_floats() {
        assert_eq!(parse_count("20"), Some(20));
        assert_eq!(parse_count("20.0"), Some(20));
        assert_eq!(parse_count("20.5"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn test_parse_count_rejects_out_of_range() {
        assert_eq!(parse_count("1e20"), None);
        assert_eq!(parse_count("-1e20"), None);
        assert_eq!(parse_count("1e6"), Some(1_000_000));
    }

    #[test]
    fn test_huge_capacity_is_error() {
        let csv = format!("{API_HEADER}\n1,2021-05-04 10:00:00,A,A,53.0,-6.0,1e20,1,9,Open\n");
        match parse(&csv).unwrap_err() {
            PipelineError::TypeParse { column, value, .. } => {
                assert_eq!(column, CAPACITY);
                assert_eq!(value, "1e20");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_padded_status_is_not_open() {
        let csv = format!(
            "{API_HEADER}\n\
             1,2021-05-04 10:00:00,A,A,53.0,-6.0,10,1,9, open \n\
             2,2021-05-04 10:00:00,B,B,53.0,-6.0,10,1,9,Open\n"
        );
        let file = parse(&csv).unwrap();

        assert_eq!(file.rows_closed, 1);
        assert_eq!(file.readings.len(), 1);
        assert_eq!(file.readings[0].station, "B");
    }

    #[test]
    fn test_station_names_are_kept_verbatim() {
        let csv = format!(
            "{API_HEADER}\n\
             1,2021-05-04 10:00:00,X,  X ,53.0,-6.0, 10 , 5 ,5,Open\n\
             2,2021-05-04 10:00:00,X,X,53.0,-6.0,10,5,5,Open\n"
        );
        let file = parse(&csv).unwrap();

        let stations: Vec<_> = file.readings.iter().map(|r| r.station.as_str()).collect();
        assert_eq!(stations, vec!["  X ", "X"]);
        // Padding around numbers is tolerated.
        assert_eq!(file.readings[0].usage_pct, 50.0);
    }
}
