//! Fear & Greed fusion: backward as-of join on calendar day, rolling sentiment
//! statistics and classification buckets.

use super::indicators::{self, numeric};
use crate::error::{Result, Stage};
use crate::table::{require_numeric, timestamp_column};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use std::fmt;
use tracing::debug;

pub const SENTIMENT_TIMESTAMP: &str = "timestamp";
pub const SENTIMENT_VALUE: &str = "value";
pub const FEAR_GREED_INDEX: &str = "fear_greed_index";

const DAY_KEY: &str = "__sentiment_day";
const ROW_KEY: &str = "__sentiment_row";

/// Classification of a 0-100 sentiment reading.
///
/// This is the only place the bucket thresholds live; the collector labels
/// and the `is_*` flag columns both read [`SentimentClass::bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentimentClass {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentClass {
    pub const ALL: [SentimentClass; 5] = [
        SentimentClass::ExtremeFear,
        SentimentClass::Fear,
        SentimentClass::Neutral,
        SentimentClass::Greed,
        SentimentClass::ExtremeGreed,
    ];

    /// Exclusive lower and inclusive upper bound of the bucket.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            SentimentClass::ExtremeFear => (f64::NEG_INFINITY, 25.0),
            SentimentClass::Fear => (25.0, 45.0),
            SentimentClass::Neutral => (45.0, 55.0),
            SentimentClass::Greed => (55.0, 75.0),
            SentimentClass::ExtremeGreed => (75.0, f64::INFINITY),
        }
    }

    pub fn from_value(value: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|class| {
                let (low, high) = class.bounds();
                value > low && value <= high
            })
            .unwrap_or(SentimentClass::ExtremeGreed)
    }

    /// Bucket membership as an expression; null where `value` is null.
    pub fn contains(&self, value: Expr) -> Expr {
        let (low, high) = self.bounds();
        value.clone().gt(lit(low)).and(value.lt_eq(lit(high)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentClass::ExtremeFear => "extreme_fear",
            SentimentClass::Fear => "fear",
            SentimentClass::Neutral => "neutral",
            SentimentClass::Greed => "greed",
            SentimentClass::ExtremeGreed => "extreme_greed",
        }
    }

    /// Name of the binary bucket column in the feature table.
    pub fn flag_column(&self) -> &'static str {
        match self {
            SentimentClass::ExtremeFear => "is_extreme_fear",
            SentimentClass::Fear => "is_fear",
            SentimentClass::Neutral => "is_neutral",
            SentimentClass::Greed => "is_greed",
            SentimentClass::ExtremeGreed => "is_extreme_greed",
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily sentiment reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentRow {
    pub date: NaiveDate,
    pub value: u8,
    pub classification: SentimentClass,
}

impl SentimentRow {
    pub fn new(date: NaiveDate, value: u8) -> Self {
        Self {
            date,
            value,
            classification: SentimentClass::from_value(f64::from(value)),
        }
    }
}

/// Calendar day of an instant, counted from the Unix epoch.
fn epoch_day(ts: &DateTime<Utc>) -> i32 {
    (ts.date_naive() - NaiveDate::default()).num_days() as i32
}

fn with_day_key(df: &DataFrame, timestamp: &str) -> Result<DataFrame> {
    let days: Vec<i32> = timestamp_column(df, timestamp, Stage::Sentiment)?
        .iter()
        .map(epoch_day)
        .collect();
    let mut keyed = df.clone();
    keyed.with_column(Series::new(DAY_KEY, days))?;
    Ok(keyed)
}

/// One reading per calendar day, sorted by day. Missing readings are
/// dropped and the later row of a duplicated day wins.
pub fn daily_sentiment(sentiment: &DataFrame) -> Result<LazyFrame> {
    require_numeric(sentiment, SENTIMENT_VALUE, Stage::Sentiment)?;
    let keyed = with_day_key(sentiment, SENTIMENT_TIMESTAMP)?;
    Ok(keyed
        .lazy()
        .select([col(DAY_KEY), numeric(SENTIMENT_VALUE).alias(FEAR_GREED_INDEX)])
        .filter(col(FEAR_GREED_INDEX).is_not_null())
        .group_by_stable([col(DAY_KEY)])
        .agg([col(FEAR_GREED_INDEX).last()])
        .sort(vec![DAY_KEY], Default::default()))
}

/// Append `fear_greed_index`, its 7/30-row rolling means, the 7-row change
/// and one flag per [`SentimentClass`].
///
/// Each row takes the latest reading dated on or before its own day. Rows
/// dated before the first reading keep a missing index, and all their bucket
/// flags are 0.
pub fn add_sentiment_features(
    df: DataFrame,
    sentiment: &DataFrame,
    timestamp: &str,
) -> Result<DataFrame> {
    let daily = daily_sentiment(sentiment)?;
    let keyed = with_day_key(&df, timestamp)?;

    let index = col(FEAR_GREED_INDEX);
    let mut features = vec![
        indicators::rolling_mean(index.clone(), 7).alias("fg_ma_7"),
        indicators::rolling_mean(index.clone(), 30).alias("fg_ma_30"),
        indicators::diff(index.clone(), 7).alias("fg_change_7d"),
    ];
    for class in SentimentClass::ALL {
        features.push(indicators::flag(class.contains(index.clone())).alias(class.flag_column()));
    }

    let mut output: Vec<Expr> = df.get_column_names().into_iter().map(col).collect();
    output.push(index);
    output.extend(
        ["fg_ma_7", "fg_ma_30", "fg_change_7d"]
            .into_iter()
            .chain(SentimentClass::ALL.iter().map(|class| class.flag_column()))
            .map(col),
    );

    let joined = keyed
        .lazy()
        .with_row_index(ROW_KEY, None)
        .sort(
            vec![DAY_KEY],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .join_builder()
        .with(daily)
        .left_on([col(DAY_KEY)])
        .right_on([col(DAY_KEY)])
        .how(JoinType::AsOf(AsOfOptions {
            strategy: AsofStrategy::Backward,
            ..Default::default()
        }))
        .finish()
        .sort(vec![ROW_KEY], Default::default())
        .with_columns(features)
        .select(output)
        .collect()?;

    let unmatched = joined.column(FEAR_GREED_INDEX)?.null_count();
    if unmatched > 0 {
        debug!(unmatched, "rows precede the first sentiment reading");
    }
    debug!(columns = joined.width(), "sentiment features added");
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(df: &DataFrame) -> Vec<Option<f64>> {
        df.column(FEAR_GREED_INDEX).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn thresholds_are_inclusive_upper_bounds() {
        assert_eq!(SentimentClass::from_value(0.0), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_value(25.0), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_value(26.0), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_value(45.0), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_value(55.0), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_value(75.0), SentimentClass::Greed);
        assert_eq!(SentimentClass::from_value(76.0), SentimentClass::ExtremeGreed);
        assert_eq!(SentimentRow::new(NaiveDate::default(), 80).classification.to_string(), "extreme_greed");
    }

    #[test]
    fn as_of_join_fills_forward_and_leaves_leading_gap() {
        let prices = df!(
            "timestamp" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-06"],
            "close" => &[1.0, 2.0, 3.0, 4.0, 5.0]
        )
        .unwrap();
        let sentiment = df!(
            "timestamp" => &["2024-01-02", "2024-01-04"],
            "value" => &[30i64, 70]
        )
        .unwrap();
        let out = add_sentiment_features(prices, &sentiment, "timestamp").unwrap();

        assert_eq!(out.height(), 5);
        assert_eq!(
            index_of(&out),
            vec![None, Some(30.0), Some(30.0), Some(70.0), Some(70.0)]
        );
        assert_eq!(&out.get_column_names()[..3], &["timestamp", "close", "fear_greed_index"]);
    }

    #[test]
    fn keeps_row_order_of_unsorted_prices() {
        let prices = df!("timestamp" => &["2024-01-05", "2024-01-01", "2024-01-03"]).unwrap();
        let sentiment = df!(
            "timestamp" => &["2024-01-01", "2024-01-04"],
            "value" => &[20i64, 80]
        )
        .unwrap();
        let out = add_sentiment_features(prices, &sentiment, "timestamp").unwrap();

        assert_eq!(index_of(&out), vec![Some(80.0), Some(20.0), Some(20.0)]);
        let stamps: Vec<&str> = out.column("timestamp").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(stamps, vec!["2024-01-05", "2024-01-01", "2024-01-03"]);
    }

    #[test]
    fn later_duplicate_date_wins() {
        let sentiment = df!(
            "timestamp" => &["2024-01-01 00:00:00", "2024-01-01 12:00:00", "2024-01-02 00:00:00"],
            "value" => &[Some(10i64), Some(60), None]
        )
        .unwrap();
        let daily = daily_sentiment(&sentiment).unwrap().collect().unwrap();
        assert_eq!(daily.height(), 1);
        assert_eq!(index_of(&daily), vec![Some(60.0)]);
    }

    #[test]
    fn rolling_sentiment_stats() {
        let days: Vec<String> = (1..=10).map(|d| format!("2024-01-{d:02}")).collect();
        let values: Vec<i64> = (1..=10).map(|v| v * 10).collect();
        let prices = df!("timestamp" => days.clone()).unwrap();
        let sentiment = df!("timestamp" => days, "value" => values).unwrap();
        let out = add_sentiment_features(prices, &sentiment, "timestamp").unwrap();

        let ma_7 = out.column("fg_ma_7").unwrap().f64().unwrap();
        assert_eq!(ma_7.get(0), Some(10.0));
        assert_eq!(ma_7.get(9), Some(70.0));
        let change = out.column("fg_change_7d").unwrap().f64().unwrap();
        assert_eq!(change.get(6), None);
        assert_eq!(change.get(7), Some(70.0));
        assert_eq!(out.column("is_extreme_greed").unwrap().i32().unwrap().get(9), Some(1));
    }

    #[test]
    fn missing_index_sets_no_bucket() {
        let prices = df!("timestamp" => &["2023-12-31", "2024-01-01"]).unwrap();
        let sentiment = df!("timestamp" => &["2024-01-01"], "value" => &[50i64]).unwrap();
        let out = add_sentiment_features(prices, &sentiment, "timestamp").unwrap();

        for class in SentimentClass::ALL {
            let flags: Vec<i32> = out
                .column(class.flag_column())
                .unwrap()
                .i32()
                .unwrap()
                .into_no_null_iter()
                .collect();
            let expected = if class == SentimentClass::Neutral { vec![0, 1] } else { vec![0, 0] };
            assert_eq!(flags, expected, "{class}");
        }
        assert_eq!(out.column("fear_greed_index").unwrap().null_count(), 1);
    }
}
