//! `collect`: CoinGecko snapshot plus the Fear & Greed history.

use crate::collectors::coingecko::{snapshots_to_frame, CoinGeckoClient};
use crate::collectors::fear_greed::{sentiment_frame, FearGreedClient};
use crate::collectors::or_absent;
use crate::config::Settings;
use crate::storage::{CsvStore, TableStore};
use crate::utils::measure_time_async;
use anyhow::Result;
use tracing::{info, warn};

pub async fn run(settings: &Settings) -> Result<()> {
    let store = CsvStore::new(&settings.storage.raw_dir);

    let coingecko = measure_time_async("coingecko collection", collect_coingecko(settings, &store)).await;
    let fear_greed = measure_time_async("fear & greed collection", collect_fear_greed(settings, &store)).await;

    match or_absent("coingecko", coingecko) {
        Some(rows) => info!(rows, "coingecko collected"),
        None => warn!("coingecko: nothing collected"),
    }
    match or_absent("fear_greed", fear_greed) {
        Some(rows) => info!(rows, "fear & greed collected"),
        None => warn!("fear & greed: nothing collected"),
    }
    info!(dir = %store.dir().display(), "collection finished");
    Ok(())
}

async fn collect_coingecko(settings: &Settings, store: &CsvStore) -> Result<usize> {
    let client = CoinGeckoClient::from_env()?;
    let snapshots = client.fetch_current_prices(&settings.market.coins).await?;

    if let Some(global) = or_absent("coingecko global", client.fetch_global().await) {
        info!(
            total_market_cap_usd = global.total_market_cap_usd,
            btc_dominance_percent = global.btc_dominance_percent,
            eth_dominance_percent = global.eth_dominance_percent,
            active_cryptocurrencies = global.active_cryptocurrencies,
            "global market"
        );
    }

    if snapshots.is_empty() {
        warn!("coingecko returned no prices, nothing saved");
        return Ok(0);
    }
    let mut df = snapshots_to_frame(&snapshots)?;
    store.save(&mut df, "coingecko")?;
    Ok(df.height())
}

async fn collect_fear_greed(settings: &Settings, store: &CsvStore) -> Result<usize> {
    let client = FearGreedClient::new(settings.fear_greed_url())?;
    let current = or_absent("fear_greed current", client.fetch_current().await);
    if let Some(today) = current.as_ref().and_then(|rows| rows.last()) {
        info!(date = %today.date, value = today.value, classification = %today.classification, "current sentiment");
    }

    let rows = client.fetch_history(settings.sentiment.history_days).await?;

    if rows.is_empty() {
        warn!("fear & greed returned no readings, nothing saved");
        return Ok(0);
    }
    let mut df = sentiment_frame(&rows)?;
    store.save(&mut df, "fear_greed")?;
    Ok(df.height())
}
