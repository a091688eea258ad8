//! Lagged copies of source columns.

use crate::error::Result;
use polars::prelude::*;
use tracing::debug;

pub fn lag_column_name(column: &str, lag: usize) -> String {
    format!("{column}_lag_{lag}d")
}

/// Append `{column}_lag_{n}d = column shifted down by n rows` for every
/// (column, lag) pair. Absent source columns are skipped.
pub fn add_lag_features(mut df: DataFrame, columns: &[String], lags: &[usize]) -> Result<DataFrame> {
    let mut added = 0;
    for column in columns {
        let Ok(source) = df.column(column) else {
            debug!(column = %column, "lag source not present, skipping");
            continue;
        };
        let source = source.clone();

        for &lag in lags {
            let mut lagged = source.shift(lag as i64);
            lagged.rename(&lag_column_name(column, lag));
            df.with_column(lagged)?;
            added += 1;
        }
    }

    debug!(added, columns = df.width(), "lag features added");
    Ok(df)
}
