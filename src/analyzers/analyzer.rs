use crate::analyzers::aggregate::aggregate_all;
use crate::analyzers::types::{AggregateTables, DateRow, HourRow, RunSummary, StationRow};
use crate::config::PipelineConfig;
use crate::dedup::deduplicate;
use crate::error::{PipelineError, Result};
use crate::output::{StagedTables, Table, read_table};
use crate::parser::{NormalizedFile, StationReading, parse_station_file};
use crate::regime::{CanonicalRecord, RegimeClassifier};
use crate::weather::{WeatherObservation, clip_to_range, load_weather};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files and destination of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    /// Station files in processing order. Earlier files win duplicate readings.
    pub station_files: Vec<PathBuf>,
    pub weather_file: Option<PathBuf>,
    pub out_dir: PathBuf,
}

/// Station readings of several files, concatenated in file order.
#[derive(Debug, Default)]
pub struct Combined {
    pub readings: Vec<StationReading>,
    pub files: usize,
    pub rows_read: usize,
    pub rows_closed: usize,
}

/// Lists the `.csv` files in `dir`, sorted by file name.
pub fn discover_station_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv")
        {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Folds normalized files into one table, preserving their order.
pub fn combine(files: Vec<NormalizedFile>) -> Combined {
    files.into_iter().fold(Combined::default(), |mut acc, file| {
        acc.files += 1;
        acc.rows_read += file.rows_read;
        acc.rows_closed += file.rows_closed;
        acc.readings.extend(file.readings);
        acc
    })
}

/// Normalizes every file, in parallel, and combines them in the given order.
///
/// # Errors
///
/// Fails if any file has a schema or parse error; no readings are returned then.
pub fn load_station_files(paths: &[PathBuf]) -> Result<Combined> {
    let files = paths
        .par_iter()
        .map(|path| parse_station_file(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(combine(files))
}

/// Deduplicates readings and tags them with regime and date.
/// Returns the records and the number of duplicates dropped.
pub fn build_records(
    readings: Vec<StationReading>,
    classifier: &RegimeClassifier,
) -> (Vec<CanonicalRecord>, usize) {
    let deduped = deduplicate(readings);
    (
        classifier.classify_all(deduped.readings),
        deduped.duplicates,
    )
}

/// Runs the whole pipeline: load, deduplicate, classify, aggregate, write.
///
/// Nothing is written unless every input loads and every table serializes.
#[tracing::instrument(skip_all, fields(files = input.station_files.len(), out_dir = %input.out_dir.display()))]
pub fn run(config: &PipelineConfig, input: &PipelineInput) -> Result<RunSummary> {
    if input.station_files.is_empty() {
        return Err(PipelineError::Config(
            "no station files to aggregate".to_string(),
        ));
    }
    let classifier = config.classifier()?;

    let combined = load_station_files(&input.station_files)?;
    info!(
        files = combined.files,
        rows = combined.rows_read,
        closed = combined.rows_closed,
        "Station files loaded"
    );

    let (records, duplicates) = build_records(combined.readings, &classifier);
    info!(
        records = records.len(),
        duplicates, "Readings deduplicated and classified"
    );

    let tables = aggregate_all(&records);

    let weather = match &input.weather_file {
        Some(path) => Some(weather_for(&tables, path, config.weather_preamble_lines)?),
        None => None,
    };

    let mut staged = StagedTables::new(&input.out_dir)?;
    stage(&mut staged, config, &tables.by_date)?;
    stage(&mut staged, config, &tables.by_station)?;
    stage(&mut staged, config, &tables.by_hour)?;
    match &weather {
        Some(weather) => stage(&mut staged, config, weather)?,
        // No weather table from an earlier run survives next to these tables.
        None => staged.retire(&config.output_file(WeatherObservation::SUFFIX)),
    }
    staged.commit()?;

    Ok(RunSummary {
        files_read: combined.files,
        rows_read: combined.rows_read,
        rows_closed: combined.rows_closed,
        duplicates_dropped: duplicates,
        records_aggregated: records.len(),
        date_rows: tables.by_date.len(),
        station_rows: tables.by_station.len(),
        hour_rows: tables.by_hour.len(),
        weather_rows: weather.as_ref().map(Vec::len),
    })
}

/// Weather observations limited to the date span of the bike data.
fn weather_for(
    tables: &AggregateTables,
    path: &Path,
    preamble_lines: usize,
) -> Result<Vec<WeatherObservation>> {
    let observations = load_weather(path, preamble_lines)?;
    Ok(match tables.date_span() {
        Some((first, last)) => clip_to_range(observations, first, last),
        None => Vec::new(),
    })
}

fn stage<T: Table>(staged: &mut StagedTables, config: &PipelineConfig, rows: &[T]) -> Result<()> {
    staged.stage(&config.output_file(T::SUFFIX), rows)
}

/// Reads the three aggregate tables written by [`run`] back from `dir`.
pub fn read_aggregates(config: &PipelineConfig, dir: &Path) -> Result<AggregateTables> {
    Ok(AggregateTables {
        by_date: read_table(&dir.join(config.output_file(DateRow::SUFFIX)))?,
        by_station: read_table(&dir.join(config.output_file(StationRow::SUFFIX)))?,
        by_hour: read_table(&dir.join(config.output_file(HourRow::SUFFIX)))?,
    })
}
