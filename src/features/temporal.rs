//! Calendar decomposition of the row timestamp.

use crate::error::{Result, Stage};
use crate::table::{flag_series, timestamp_column};
use chrono::{DateTime, Datelike, Timelike, Utc};
use polars::prelude::*;
use tracing::debug;

fn is_month_end(ts: &DateTime<Utc>) -> bool {
    ts.date_naive()
        .succ_opt()
        .map_or(true, |next| next.month() != ts.month())
}

/// Append year, month, day, day_of_week (0 = Monday), hour, quarter and the
/// weekend / month-start / month-end flags. Depends on the timestamp only.
pub fn add_temporal_features(mut df: DataFrame, timestamp: &str) -> Result<DataFrame> {
    let stamps = timestamp_column(&df, timestamp, Stage::Temporal)?;

    let int_column = |name: &str, f: fn(&DateTime<Utc>) -> i32| -> Series {
        let values: Vec<i32> = stamps.iter().map(f).collect();
        Series::new(name, values)
    };

    let weekday = |ts: &DateTime<Utc>| ts.weekday().num_days_from_monday() as i32;

    let columns = [
        int_column("year", |ts| ts.year()),
        int_column("month", |ts| ts.month() as i32),
        int_column("day", |ts| ts.day() as i32),
        int_column("day_of_week", weekday),
        int_column("hour", |ts| ts.hour() as i32),
        int_column("quarter", |ts| ((ts.month() - 1) / 3 + 1) as i32),
        flag_series("is_weekend", stamps.iter().map(|ts| weekday(ts) >= 5)),
        flag_series("is_month_start", stamps.iter().map(|ts| ts.day() == 1)),
        flag_series("is_month_end", stamps.iter().map(is_month_end)),
    ];

    for series in columns {
        df.with_column(series)?;
    }

    debug!(columns = df.width(), "temporal features added");
    Ok(df)
}
