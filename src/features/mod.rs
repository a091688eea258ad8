//! Feature engineering: runs the technical, temporal, sentiment and lag
//! stages on one asset's price table and trims the warm-up rows.

use crate::error::{Result, Stage};
use crate::table::{float_column, string_column, take_rows, timestamp_column};
use crate::utils::measure_time;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod indicators;
pub mod lags;
pub mod sentiment;
pub mod technical;
pub mod temporal;

pub use sentiment::{SentimentClass, SentimentRow};

/// Rows missing any of these (plus the price column) are dropped at the end.
const TRIM_REQUIRED: [&str; 2] = ["sma_7", "rsi_14"];

/// Column layout of a raw price table.
///
/// `volume` is the explicit input-presence flag for volume indicators:
/// `Some` requires the column, `None` skips the indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSchema {
    pub timestamp: String,
    pub price: String,
    pub volume: Option<String>,
}

impl Default for PriceSchema {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            price: "price_usd".to_string(),
            volume: Some("volume_24h_usd".to_string()),
        }
    }
}

impl PriceSchema {
    /// Layout of the exchange candle files.
    pub fn binance() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            price: "close".to_string(),
            volume: Some("volume_usd".to_string()),
        }
    }

    /// Keep the volume flag only if the frame actually carries that column.
    pub fn detect(self, df: &DataFrame) -> Self {
        let volume = self
            .volume
            .filter(|name| df.get_column_names().iter().any(|c| *c == name.as_str()));
        Self { volume, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub include_lags: bool,
    /// Lag sources; `None` means the schema's price and volume columns.
    pub lag_columns: Option<Vec<String>>,
    pub lag_periods: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            include_lags: true,
            lag_columns: None,
            lag_periods: vec![1, 7, 30],
        }
    }
}

/// Final feature table and the number of warm-up rows the trim removed.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub frame: DataFrame,
    pub dropped_rows: usize,
}

pub struct FeaturePipeline {
    config: FeatureConfig,
    schema: Option<PriceSchema>,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            schema: None,
        }
    }

    /// Use this layout as-is instead of detecting the volume column.
    pub fn with_schema(mut self, schema: PriceSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    fn lag_columns(&self, schema: &PriceSchema) -> Vec<String> {
        match &self.config.lag_columns {
            Some(columns) => columns.clone(),
            None => std::iter::once(schema.price.clone())
                .chain(schema.volume.clone())
                .collect(),
        }
    }

    /// Run technical, temporal, sentiment (if given) and lag (if enabled)
    /// stages in that order, then trim. `price` must be one asset sorted by time.
    pub fn run(&self, price: &DataFrame, sentiment: Option<&DataFrame>) -> Result<FeatureTable> {
        measure_time("feature engineering", || self.run_stages(price, sentiment))
    }

    fn run_stages(&self, price: &DataFrame, sentiment: Option<&DataFrame>) -> Result<FeatureTable> {
        let schema = match &self.schema {
            Some(schema) => schema.clone(),
            None => PriceSchema::default().detect(price),
        };

        let mut df = technical::add_technical_indicators(price.clone(), &schema)?;
        df = temporal::add_temporal_features(df, &schema.timestamp)?;

        match sentiment {
            Some(sentiment) => {
                df = sentiment::add_sentiment_features(df, sentiment, &schema.timestamp)?;
            }
            None => debug!("no sentiment table, sentiment stage skipped"),
        }

        if self.config.include_lags {
            df = lags::add_lag_features(df, &self.lag_columns(&schema), &self.config.lag_periods)?;
        }

        let (frame, dropped_rows) = trim_warmup(df, &schema.price)?;
        if dropped_rows > 0 {
            warn!(dropped_rows, "rows removed for missing values");
        }
        info!(
            rows = frame.height(),
            columns = frame.width(),
            "feature engineering done"
        );

        Ok(FeatureTable {
            frame,
            dropped_rows,
        })
    }
}

/// Build the full feature table with the default configuration.
pub fn build_features(
    price: &DataFrame,
    sentiment: Option<&DataFrame>,
    include_lags: bool,
) -> Result<FeatureTable> {
    let config = FeatureConfig {
        include_lags,
        ..FeatureConfig::default()
    };
    FeaturePipeline::new(config).run(price, sentiment)
}

/// Drop every row where the price, `sma_7` or `rsi_14` is missing.
pub fn trim_warmup(df: DataFrame, price: &str) -> Result<(DataFrame, usize)> {
    let required = std::iter::once(price)
        .chain(TRIM_REQUIRED)
        .map(|name| float_column(&df, name, Stage::Trim))
        .collect::<Result<Vec<_>>>()?;

    let keep: Vec<usize> = (0..df.height())
        .filter(|&row| required.iter().all(|column| column[row].is_some()))
        .collect();
    let dropped = df.height() - keep.len();
    if dropped == 0 {
        return Ok((df, 0));
    }
    Ok((take_rows(&df, &keep)?, dropped))
}

/// Split a multi-asset table into one frame per symbol, each sorted by
/// timestamp. Symbols keep their order of first appearance; equal
/// timestamps keep their input order.
pub fn split_by_symbol(
    df: &DataFrame,
    symbol: &str,
    timestamp: &str,
) -> Result<Vec<(String, DataFrame)>> {
    let symbols = string_column(df, symbol, Stage::Ingest)?;
    let stamps = timestamp_column(df, timestamp, Stage::Ingest)?;

    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (row, name) in symbols.into_iter().enumerate() {
        let Some(name) = name else { continue };
        match groups.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((name, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(name, mut rows)| {
            rows.sort_by_key(|&row| stamps[row]);
            debug!(symbol = %name, rows = rows.len(), "split asset");
            Ok((name, take_rows(df, &rows)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_drops_absent_volume() {
        let df = df!("timestamp" => &["2024-01-01"], "price_usd" => &[1.0]).unwrap();
        assert_eq!(PriceSchema::default().detect(&df).volume, None);

        let df = df!(
            "timestamp" => &["2024-01-01"],
            "price_usd" => &[1.0],
            "volume_24h_usd" => &[5.0]
        )
        .unwrap();
        assert_eq!(
            PriceSchema::default().detect(&df).volume.as_deref(),
            Some("volume_24h_usd")
        );
    }

    #[test]
    fn trim_counts_dropped_rows() {
        let df = df!(
            "price_usd" => &[None, Some(2.0), Some(3.0)],
            "sma_7" => &[Some(1.0), Some(2.0), None],
            "rsi_14" => &[Some(50.0), Some(50.0), Some(50.0)]
        )
        .unwrap();
        let (trimmed, dropped) = trim_warmup(df, "price_usd").unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(trimmed.height(), 1);
    }

    #[test]
    fn split_sorts_each_symbol() {
        let df = df!(
            "timestamp" => &["2024-01-02", "2024-01-01", "2024-01-01", "2024-01-03"],
            "symbol" => &["BTC", "ETH", "BTC", "BTC"],
            "price_usd" => &[2.0, 10.0, 1.0, 3.0]
        )
        .unwrap();

        let parts = split_by_symbol(&df, "symbol", "timestamp").unwrap();
        let names: Vec<&str> = parts.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["BTC", "ETH"]);

        let btc: Vec<f64> = parts[0]
            .1
            .column("price_usd")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(btc, vec![1.0, 2.0, 3.0]);
    }
}
