//! `process`: newest raw files in, one feature table per asset out.

use crate::commands::collect_binance::file_stem;
use crate::config::Settings;
use crate::features::{split_by_symbol, FeatureConfig, FeaturePipeline, PriceSchema};
use crate::kline::Timeframe;
use crate::storage::{CsvStore, TableStore};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use tracing::{info, warn};

pub const SYMBOL_COLUMN: &str = "symbol";
const SENTIMENT_PREFIX: &str = "fear_greed_";

/// Which raw price files to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    Coingecko,
    Binance,
}

impl Source {
    pub fn schema(&self) -> PriceSchema {
        match self {
            Source::Coingecko => PriceSchema::default(),
            Source::Binance => PriceSchema::binance(),
        }
    }
}

pub fn run(settings: &Settings, source: Source, no_lags: bool) -> Result<()> {
    let raw = CsvStore::new(&settings.storage.raw_dir);
    let processed = CsvStore::new(&settings.storage.processed_dir);

    let prices = load_prices(settings, &raw, source)?;
    if prices.is_empty() {
        bail!(
            "No {:?} price file in {}, run a collect command first",
            source,
            raw.dir().display()
        );
    }

    let sentiment = match raw.load_latest(SENTIMENT_PREFIX)? {
        Some((path, df)) => {
            info!(path = %path.display(), rows = df.height(), "sentiment loaded");
            Some(df)
        }
        None => {
            warn!("no sentiment file, sentiment features skipped");
            None
        }
    };

    let mut config = settings.features.clone();
    if no_lags {
        config.include_lags = false;
    }

    let schema = source.schema();
    let mut written = Vec::new();
    for (path, price) in &prices {
        info!(path = %path.display(), rows = price.height(), "prices loaded");
        for (symbol, frame) in split_by_symbol(price, SYMBOL_COLUMN, &schema.timestamp)? {
            let path = process_symbol(&processed, &config, &schema, &symbol, &frame, sentiment.as_ref())?;
            written.push(path);
        }
    }

    info!(
        assets = written.len(),
        dir = %processed.dir().display(),
        "feature engineering finished"
    );
    Ok(())
}

/// Stem of an asset's feature file, e.g. `bitcoin_features`.
pub fn features_stem(symbol: &str) -> String {
    format!("{}_features", symbol.to_lowercase())
}

fn load_prices(settings: &Settings, raw: &CsvStore, source: Source) -> Result<Vec<(PathBuf, DataFrame)>> {
    let prefixes = match source {
        Source::Coingecko => vec!["coingecko_".to_string()],
        Source::Binance => {
            let timeframe: Timeframe = settings.market.timeframe.parse()?;
            settings
                .market
                .pairs
                .iter()
                .map(|pair| format!("{}_", file_stem(pair, timeframe)))
                .collect()
        }
    };

    let mut prices = Vec::new();
    for prefix in prefixes {
        match raw.load_latest(&prefix)? {
            Some(found) => prices.push(found),
            None => warn!(prefix = %prefix, "no raw file"),
        }
    }
    Ok(prices)
}

fn process_symbol(
    store: &CsvStore,
    config: &FeatureConfig,
    schema: &PriceSchema,
    symbol: &str,
    frame: &DataFrame,
    sentiment: Option<&DataFrame>,
) -> Result<PathBuf> {
    info!(symbol, rows = frame.height(), "building features");
    let table = FeaturePipeline::new(config.clone())
        .with_schema(schema.clone().detect(frame))
        .run(frame, sentiment)
        .with_context(|| format!("Feature engineering failed for {symbol}"))?;

    let mut df = table.frame;
    let path = store.save(&mut df, &features_stem(symbol))?;
    info!(
        symbol,
        rows = df.height(),
        columns = df.width(),
        dropped_rows = table.dropped_rows,
        "features saved"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageSettings;
    use polars::prelude::*;

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            storage: StorageSettings {
                raw_dir: dir.join("raw"),
                processed_dir: dir.join("processed"),
            },
            ..Settings::default()
        }
    }

    #[test]
    fn writes_one_table_per_symbol() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());

        let mut raw = df!(
            "timestamp" => &["2024-01-02", "2024-01-01", "2024-01-01", "2024-01-02"],
            "symbol" => &["BITCOIN", "BITCOIN", "ETHEREUM", "ETHEREUM"],
            "price_usd" => &[101.0, 100.0, 50.0, 51.0],
            "volume_24h_usd" => &[10.0, 11.0, 5.0, 6.0],
        )
        .unwrap();
        CsvStore::new(&settings.storage.raw_dir)
            .save(&mut raw, "coingecko")
            .unwrap();

        run(&settings, Source::Coingecko, false).unwrap();

        let processed = CsvStore::new(&settings.storage.processed_dir);
        let (_, btc) = processed.load_latest("bitcoin_features_").unwrap().unwrap();
        assert_eq!(btc.height(), 2);
        assert!(btc.column("volume_ratio").is_ok());
        assert!(btc.column("price_usd_lag_1d").is_ok());
        assert!(btc.column("fear_greed_index").is_err());
        assert!(processed.latest("ethereum_features_").unwrap().is_some());
    }

    #[test]
    fn missing_raw_prices_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        assert!(run(&settings, Source::Binance, true).is_err());
    }
}
