//! Typed column access over polars frames.
//!
//! Stages never rely on implicit index alignment: new columns are either
//! lazy expressions over the same frame or a `Series` of the same height.

use crate::error::{FeatureError, Result, Stage};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;

/// Epoch integers at or above this magnitude are milliseconds, below it seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

pub fn require_column<'a>(df: &'a DataFrame, name: &str, stage: Stage) -> Result<&'a Series> {
    df.column(name).map_err(|_| FeatureError::MissingColumn {
        column: name.to_string(),
        stage,
    })
}

/// Fail unless `name` exists and holds numbers.
pub fn require_numeric(df: &DataFrame, name: &str, stage: Stage) -> Result<()> {
    let series = require_column(df, name, stage)?;
    if !series.dtype().is_numeric() {
        return Err(FeatureError::UnsupportedType {
            column: name.to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    Ok(())
}

/// Read a numeric column as `Option<f64>`; nulls and NaNs both come back as `None`.
pub fn float_column(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<Option<f64>>> {
    require_numeric(df, name, stage)?;
    let cast = df.column(name)?.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

pub fn string_column(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<Option<String>>> {
    let series = require_column(df, name, stage)?;
    let cast = series.cast(&DataType::String)?;
    let values = cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect();
    Ok(values)
}

/// Read an instant column as UTC timestamps.
///
/// Accepts polars `Datetime` and `Date` columns, integer epochs (seconds or
/// milliseconds) and the string layouts written by the collectors.
pub fn timestamp_column(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<DateTime<Utc>>> {
    let series = require_column(df, name, stage)?;
    let invalid = |row: usize, value: String| FeatureError::InvalidTimestamp {
        column: name.to_string(),
        row,
        value,
    };

    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = series.cast(&DataType::Int64)?;
            physical
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, raw)| {
                    raw.and_then(|raw| from_time_unit(raw, unit))
                        .ok_or_else(|| invalid(row, format!("{raw:?}")))
                })
                .collect()
        }
        DataType::Date => {
            let physical = series.cast(&DataType::Int32)?;
            physical
                .i32()?
                .into_iter()
                .enumerate()
                .map(|(row, days)| {
                    days.and_then(from_epoch_days)
                        .ok_or_else(|| invalid(row, format!("{days:?}")))
                })
                .collect()
        }
        DataType::String => {
            series
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, text)| {
                    text.and_then(parse_timestamp)
                        .ok_or_else(|| invalid(row, text.unwrap_or("null").to_string()))
                })
                .collect()
        }
        dtype if dtype.is_integer() => {
            let physical = series.cast(&DataType::Int64)?;
            physical
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, raw)| {
                    raw.and_then(from_epoch)
                        .ok_or_else(|| invalid(row, format!("{raw:?}")))
                })
                .collect()
        }
        other => Err(FeatureError::UnsupportedType {
            column: name.to_string(),
            dtype: other.to_string(),
        }),
    }
}

/// Parse the textual timestamp layouts found in raw files.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_time_unit(raw: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
    }
}

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    if raw.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

fn from_epoch_days(days: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(days) * 86_400, 0)
}

pub fn flag_series(name: &str, flags: impl IntoIterator<Item = bool>) -> Series {
    let values: Vec<i32> = flags.into_iter().map(i32::from).collect();
    Series::new(name, values)
}

/// Keep only the listed rows, in the listed order.
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let indices: Vec<IdxSize> = rows.iter().map(|&row| row as IdxSize).collect();
    let idx = IdxCa::from_vec("idx", indices);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_collector_layouts() {
        let plain = parse_timestamp("2024-01-03 14:30:00").unwrap();
        assert_eq!((plain.day(), plain.hour(), plain.minute()), (3, 14, 30));

        let fractional = parse_timestamp("2024-01-03 14:30:00.123456").unwrap();
        assert_eq!(fractional.minute(), 30);

        let iso = parse_timestamp("2024-01-03T14:30:00").unwrap();
        assert_eq!(iso, plain);

        let rfc = parse_timestamp("2024-01-03T15:30:00+01:00").unwrap();
        assert_eq!(rfc, plain);

        let date_only = parse_timestamp("2024-01-03").unwrap();
        assert_eq!(date_only.hour(), 0);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn reads_integer_epochs_in_seconds_and_millis() {
        let df = df!("timestamp" => &[1_704_067_200i64, 1_704_067_200_000i64]).unwrap();
        let parsed = timestamp_column(&df, "timestamp", Stage::Temporal).unwrap();
        assert_eq!(parsed[0], parsed[1]);
        assert_eq!(parsed[0].year(), 2024);
    }

    #[test]
    fn reports_bad_timestamp_row() {
        let df = df!("timestamp" => &["2024-01-01", "not a date"]).unwrap();
        let err = timestamp_column(&df, "timestamp", Stage::Temporal).unwrap_err();
        match err {
            FeatureError::InvalidTimestamp { row, .. } => assert_eq!(row, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn float_column_treats_nan_as_missing() {
        let df = df!("x" => &[Some(1.0), None, Some(f64::NAN)]).unwrap();
        let values = float_column(&df, "x", Stage::Technical).unwrap();
        assert_eq!(values, vec![Some(1.0), None, None]);
    }

    #[test]
    fn missing_column_names_stage() {
        let df = df!("x" => &[1.0]).unwrap();
        let err = float_column(&df, "price_usd", Stage::Technical).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::MissingColumn { ref column, stage: Stage::Technical } if column == "price_usd"
        ));
    }
}
