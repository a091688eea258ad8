use anyhow::bail;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// One kline array as sent by the REST endpoint: open time, OHLCV as
/// strings, close time, quote volume, trade count and three trailing fields.
type RawKline = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    String,
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawKline")]
pub struct Kline {
    pub open_time: i64, // milliseconds
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64, // milliseconds
}

impl TryFrom<RawKline> for Kline {
    type Error = std::num::ParseFloatError;

    fn try_from(raw: RawKline) -> Result<Self, Self::Error> {
        let (open_time, open, high, low, close, volume, close_time, ..) = raw;
        Ok(Kline {
            open_time,
            open: open.parse()?,
            high: high.parse()?,
            low: low.parse()?,
            close: close.parse()?,
            volume: volume.parse()?,
            close_time,
        })
    }
}

/// Candle interval supported by the exchange collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    pub fn millis(&self) -> i64 {
        const MINUTE: i64 = 60 * 1000;
        match self {
            Timeframe::M1 => MINUTE,
            Timeframe::M5 => 5 * MINUTE,
            Timeframe::M15 => 15 * MINUTE,
            Timeframe::M30 => 30 * MINUTE,
            Timeframe::H1 => 60 * MINUTE,
            Timeframe::H4 => 4 * 60 * MINUTE,
            Timeframe::D1 => 24 * 60 * MINUTE,
            Timeframe::W1 => 7 * 24 * 60 * MINUTE,
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let timeframe = match s {
            "1m" => Timeframe::M1,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" => Timeframe::H1,
            "4h" => Timeframe::H4,
            "1d" => Timeframe::D1,
            "1w" => Timeframe::W1,
            _ => bail!("Unsupported timeframe: {}", s),
        };
        Ok(timeframe)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert milliseconds to a UTC string (e.g. "2025-03-21 14:32:17").
pub fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("Invalid({})", ms))
}

/// Candle table for one pair, with the derived spread and USD volume columns.
pub fn klines_to_dataframe(
    klines: &[Kline],
    symbol: &str,
    timeframe: Timeframe,
) -> PolarsResult<DataFrame> {
    let timestamp: Vec<String> = klines.iter().map(|k| format_time(k.open_time)).collect();
    let open: Vec<f64> = klines.iter().map(|k| k.open).collect();
    let high: Vec<f64> = klines.iter().map(|k| k.high).collect();
    let low: Vec<f64> = klines.iter().map(|k| k.low).collect();
    let close: Vec<f64> = klines.iter().map(|k| k.close).collect();
    let volume: Vec<f64> = klines.iter().map(|k| k.volume).collect();
    let price_change: Vec<f64> = klines.iter().map(|k| k.close - k.open).collect();
    let price_change_pct: Vec<Option<f64>> = klines
        .iter()
        .map(|k| {
            let pct = (k.close - k.open) / k.open * 100.0;
            pct.is_finite().then_some(pct)
        })
        .collect();
    let high_low_spread: Vec<f64> = klines.iter().map(|k| k.high - k.low).collect();
    let volume_usd: Vec<f64> = klines.iter().map(|k| k.volume * k.close).collect();

    df!(
        "timestamp" => timestamp,
        "open" => open,
        "high" => high,
        "low" => low,
        "close" => close,
        "volume" => volume,
        "symbol" => vec![symbol; klines.len()],
        "timeframe" => vec![timeframe.as_str(); klines.len()],
        "price_change" => price_change,
        "price_change_pct" => price_change_pct,
        "high_low_spread" => high_low_spread,
        "volume_usd" => volume_usd,
    )
}
