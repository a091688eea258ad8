//! Technical indicator stage.

use super::indicators;
use super::PriceSchema;
use crate::error::{Result, Stage};
use crate::table::require_numeric;
use polars::prelude::*;
use tracing::debug;

pub const SMA_SHORT: usize = 7;
pub const SMA_LONG: usize = 30;
pub const EMA_FAST: usize = 12;
pub const EMA_SLOW: usize = 26;
pub const RSI_PERIOD: usize = 14;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;
pub const PRICE_CHANGE_PERIODS: [usize; 3] = [1, 7, 30];

/// Append moving averages, RSI, MACD, Bollinger bands, price changes, volume
/// indicators (when the schema declares a volume column), price/SMA ratios
/// and the SMA crossover flag.
pub fn add_technical_indicators(df: DataFrame, schema: &PriceSchema) -> Result<DataFrame> {
    require_numeric(&df, &schema.price, Stage::Technical)?;
    if let Some(volume) = &schema.volume {
        require_numeric(&df, volume, Stage::Technical)?;
    }

    let price = indicators::numeric(&schema.price);
    let sma_short = indicators::sma(price.clone(), SMA_SHORT);
    let sma_long = indicators::sma(price.clone(), SMA_LONG);
    let macd = indicators::macd(price.clone(), EMA_FAST, EMA_SLOW, MACD_SIGNAL);
    let bands = indicators::bollinger(price.clone(), BOLLINGER_WINDOW, BOLLINGER_K);

    let mut columns = vec![
        sma_short.clone().alias("sma_7"),
        sma_long.clone().alias("sma_30"),
        indicators::ema(price.clone(), EMA_FAST).alias("ema_12"),
        indicators::ema(price.clone(), EMA_SLOW).alias("ema_26"),
        indicators::rsi(price.clone(), RSI_PERIOD).alias("rsi_14"),
        macd.macd.alias("macd"),
        macd.signal.alias("macd_signal"),
        macd.histogram.alias("macd_histogram"),
        bands.upper.alias("bb_upper"),
        bands.middle.alias("bb_middle"),
        bands.lower.alias("bb_lower"),
        bands.width.alias("bb_width"),
    ];

    for period in PRICE_CHANGE_PERIODS {
        let name = format!("price_change_{period}d");
        columns.push(indicators::pct_change(price.clone(), period).alias(&name));
    }

    match &schema.volume {
        Some(volume) => {
            let vol = indicators::volume_indicators(indicators::numeric(volume));
            columns.push(vol.ma_7.alias("volume_ma_7"));
            columns.push(vol.ma_30.alias("volume_ma_30"));
            columns.push(vol.ratio.alias("volume_ratio"));
            columns.push(vol.change_1d.alias("volume_change_1d"));
            columns.push(vol.spike.alias("volume_spike"));
        }
        None => debug!("no volume column declared, skipping volume indicators"),
    }

    columns.push(indicators::ratio(price.clone(), sma_short.clone()).alias("price_to_sma7_ratio"));
    columns.push(indicators::ratio(price, sma_long.clone()).alias("price_to_sma30_ratio"));
    columns.push(indicators::flag(sma_short.gt(sma_long)).alias("sma_crossover"));

    let df = df.lazy().with_columns(columns).collect()?;

    debug!(columns = df.width(), "technical indicators added");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureError;

    fn schema(volume: Option<&str>) -> PriceSchema {
        PriceSchema {
            volume: volume.map(str::to_owned),
            ..PriceSchema::default()
        }
    }

    #[test]
    fn appends_volume_columns_only_when_declared() {
        let df = df!(
            "timestamp" => &["2024-01-01", "2024-01-02", "2024-01-03"],
            "price_usd" => &[1.0, 2.0, 3.0],
            "volume_24h_usd" => &[10.0, 10.0, 50.0]
        )
        .unwrap();

        let with_volume = add_technical_indicators(df.clone(), &schema(Some("volume_24h_usd"))).unwrap();
        assert!(with_volume.column("volume_spike").is_ok());
        assert!(with_volume.column("volume_ratio").is_ok());

        let without = add_technical_indicators(df, &schema(None)).unwrap();
        assert!(without.column("volume_ma_7").is_err());
        assert!(without.column("sma_crossover").is_ok());
    }

    #[test]
    fn declared_volume_must_exist() {
        let df = df!(
            "timestamp" => &["2024-01-01"],
            "price_usd" => &[1.0]
        )
        .unwrap();
        let err = add_technical_indicators(df, &schema(Some("volume_24h_usd"))).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { stage: Stage::Technical, .. }));
    }

    #[test]
    fn crossover_flags_short_above_long() {
        // Falling then sharply rising: SMA7 overtakes SMA30 at the end.
        let mut prices: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        prices.extend([150.0, 160.0, 170.0]);
        let df = df!("price_usd" => &prices).unwrap();

        let out = add_technical_indicators(df, &schema(None)).unwrap();
        let flags: Vec<i32> = out
            .column("sma_crossover")
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(flags[0], 0); // equal averages on the first row
        assert_eq!(flags[5], 0);
        assert_eq!(*flags.last().unwrap(), 1);
    }
}
