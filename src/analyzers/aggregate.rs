use crate::analyzers::calendar::{day_of_month_of, hour_of, month_of, weekday_of};
use crate::analyzers::types::{AggregateTables, DateRow, HourRow, StationRow};
use crate::analyzers::utility::Accumulator;
use crate::regime::{CanonicalRecord, Regime};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Coordinate usable as an ordered map key, compared by IEEE total order.
///
/// Readings whose coordinates differ in any bit land in different groups.
#[derive(Debug, Clone, Copy)]
struct Coord(f64);

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Folds `usage_pct` into one accumulator per key. Keys come back sorted.
fn group_by<K, F>(records: &[CanonicalRecord], key: F) -> BTreeMap<K, Accumulator>
where
    K: Ord,
    F: Fn(&CanonicalRecord) -> K,
{
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record.usage_pct);
    }
    groups
}

/// Groups by `(date, regime)` and attaches the date's calendar components.
pub fn aggregate_by_date(records: &[CanonicalRecord]) -> Vec<DateRow> {
    group_by(records, |r| (r.date, r.regime))
        .into_iter()
        .map(|((date, regime), acc)| {
            let s = acc.summary();
            DateRow {
                date,
                regime,
                average_usage: s.mean,
                std_dev_usage: s.std_dev,
                sem_usage: s.sem,
                day_of_week: weekday_of(date),
                day_of_month: day_of_month_of(date),
                month: month_of(date),
            }
        })
        .collect()
}

/// Groups by `(station, lat, lon, regime)`.
pub fn aggregate_by_station(records: &[CanonicalRecord]) -> Vec<StationRow> {
    group_by(records, |r| {
        (r.station.clone(), Coord(r.lat), Coord(r.lon), r.regime)
    })
    .into_iter()
    .map(|((station, lat, lon, regime), acc)| {
        let s = acc.summary();
        StationRow {
            station,
            lat: lat.0,
            lon: lon.0,
            regime,
            average_usage: s.mean,
            std_dev_usage: s.std_dev,
            sem_usage: s.sem,
        }
    })
    .collect()
}

/// Groups by `(date, hour, regime)`.
pub fn aggregate_by_hour(records: &[CanonicalRecord]) -> Vec<HourRow> {
    group_by(records, |r| -> (NaiveDate, u32, Regime) {
        (r.date, hour_of(r.timestamp), r.regime)
    })
    .into_iter()
    .map(|((date, hour, regime), acc)| {
        let s = acc.summary();
        HourRow {
            date,
            hour,
            regime,
            average_usage: s.mean,
            std_dev_usage: s.std_dev,
            sem_usage: s.sem,
        }
    })
    .collect()
}

/// Builds all three tables. The groupings share no state and run concurrently.
pub fn aggregate_all(records: &[CanonicalRecord]) -> AggregateTables {
    let (by_date, (by_station, by_hour)) = rayon::join(
        || aggregate_by_date(records),
        || {
            rayon::join(
                || aggregate_by_station(records),
                || aggregate_by_hour(records),
            )
        },
    );

    AggregateTables {
        by_date,
        by_station,
        by_hour,
    }
}
