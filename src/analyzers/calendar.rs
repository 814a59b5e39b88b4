//! Calendar components used to line up days from different years.
//!
//! The aggregate tables carry plain integers; mapping them onto display
//! axes is left to whatever renders the tables.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Day of the week, 0 = Monday .. 6 = Sunday.
pub fn weekday_of(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Day of the month, 1..=31.
pub fn day_of_month_of(date: NaiveDate) -> u32 {
    date.day()
}

/// Month of the year, 1..=12.
pub fn month_of(date: NaiveDate) -> u32 {
    date.month()
}

/// Hour of the day, 0..=23.
pub fn hour_of(timestamp: NaiveDateTime) -> u32 {
    timestamp.hour()
}
