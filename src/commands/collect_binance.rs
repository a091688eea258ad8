//! `collect-binance`: candle history for every configured pair.

use crate::collectors::binance::BinanceClient;
use crate::collectors::or_absent;
use crate::config::Settings;
use crate::kline::{klines_to_dataframe, Timeframe};
use crate::storage::{CsvStore, TableStore};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

pub async fn run(settings: &Settings, days: Option<u32>, timeframe: Option<&str>) -> Result<()> {
    let timeframe: Timeframe = timeframe.unwrap_or(settings.market.timeframe.as_str()).parse()?;
    let days = days.unwrap_or(settings.market.days_back);
    let store = CsvStore::new(&settings.storage.raw_dir);
    let client = BinanceClient::new()?;

    info!(pairs = settings.market.pairs.len(), %timeframe, days, "collecting candles");

    let mut saved = 0;
    for (i, pair) in settings.market.pairs.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, settings.market.pairs.len(), pair);
        let result = collect_pair(&client, &store, pair, timeframe, days).await;
        match or_absent(pair, result) {
            Some(Some(path)) => {
                info!(pair = %pair, path = %path.display(), "pair saved");
                saved += 1;
            }
            Some(None) => warn!(pair = %pair, "no candles returned"),
            None => warn!(pair = %pair, "pair skipped"),
        }
    }

    info!(saved, total = settings.market.pairs.len(), "candle collection finished");
    Ok(())
}

/// Stem of a candle file, e.g. `binance_btcusdt_1d`.
pub fn file_stem(pair: &str, timeframe: Timeframe) -> String {
    format!("binance_{}_{}", pair.to_lowercase(), timeframe)
}

async fn collect_pair(
    client: &BinanceClient,
    store: &CsvStore,
    pair: &str,
    timeframe: Timeframe,
    days: u32,
) -> Result<Option<PathBuf>> {
    let klines = client.fetch_history(pair, timeframe, days).await?;
    if klines.is_empty() {
        return Ok(None);
    }
    let mut df = klines_to_dataframe(&klines, pair, timeframe)?;
    let path = store.save(&mut df, &file_stem(pair, timeframe))?;
    Ok(Some(path))
}
