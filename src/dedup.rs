//! Removal of repeated readings across overlapping input files.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::parser::StationReading;

/// Readings that survived deduplication, and how many were dropped.
#[derive(Debug)]
pub struct Deduplicated {
    pub readings: Vec<StationReading>,
    pub duplicates: usize,
}

/// Keeps the first reading seen for each `(station, timestamp)` pair.
///
/// Input order decides which duplicate wins, so callers must pass readings
/// in a deterministic file order.
pub fn deduplicate(readings: Vec<StationReading>) -> Deduplicated {
    let total = readings.len();
    let mut seen: HashSet<(String, NaiveDateTime)> = HashSet::with_capacity(total);

    let readings: Vec<_> = readings
        .into_iter()
        .filter(|r| seen.insert((r.station.clone(), r.timestamp)))
        .collect();

    Deduplicated {
        duplicates: total - readings.len(),
        readings,
    }
}
