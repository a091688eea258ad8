//! Spot prices and global market figures from the CoinGecko demo API.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;
use url::Url;

pub const API_KEY_ENV: &str = "COINGECKO_API_KEY";
const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One coin entry of `/simple/price`; absent figures read as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimplePrice {
    pub usd: f64,
    pub usd_market_cap: f64,
    pub usd_24h_vol: f64,
    pub usd_24h_change: f64,
    pub last_updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: SimplePrice,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GlobalData {
    total_market_cap: BTreeMap<String, f64>,
    total_volume: BTreeMap<String, f64>,
    market_cap_percentage: BTreeMap<String, f64>,
    active_cryptocurrencies: u64,
}

/// Market-wide figures from `/global`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMarket {
    pub timestamp: DateTime<Utc>,
    pub total_market_cap_usd: f64,
    pub total_volume_24h_usd: f64,
    pub btc_dominance_percent: f64,
    pub eth_dominance_percent: f64,
    pub active_cryptocurrencies: u64,
}

pub struct CoinGeckoClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Client keyed from `COINGECKO_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("{API_KEY_ENV} is not set"))?;
        Self::new(api_key)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        let body = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("coingecko request failed")?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// Current price, market cap, 24h volume and 24h change for each coin id.
    pub async fn fetch_current_prices(&self, coins: &[String]) -> Result<Vec<MarketSnapshot>> {
        info!(coins = coins.len(), "fetching coingecko prices");
        let url = Url::parse_with_params(
            &format!("{}/simple/price", self.base_url),
            &[
                ("ids", coins.join(",")),
                ("vs_currencies", "usd".to_string()),
                ("include_market_cap", "true".to_string()),
                ("include_24hr_vol", "true".to_string()),
                ("include_24hr_change", "true".to_string()),
                ("include_last_updated_at", "true".to_string()),
            ],
        )?;
        let body = self.get_text(url).await?;
        let snapshots = parse_prices(&body, Utc::now())?;
        info!(coins = snapshots.len(), "coingecko prices fetched");
        Ok(snapshots)
    }

    pub async fn fetch_global(&self) -> Result<GlobalMarket> {
        let url = Url::parse(&format!("{}/global", self.base_url))?;
        let body = self.get_text(url).await?;
        parse_global(&body, Utc::now())
    }
}

/// Decode a `/simple/price` body; symbols are upper-cased coin ids.
pub fn parse_prices(body: &str, timestamp: DateTime<Utc>) -> Result<Vec<MarketSnapshot>> {
    let prices: BTreeMap<String, SimplePrice> =
        serde_json::from_str(body).context("unexpected coingecko price payload")?;
    Ok(prices
        .into_iter()
        .map(|(coin, price)| MarketSnapshot {
            timestamp,
            symbol: coin.to_uppercase(),
            price,
        })
        .collect())
}

pub fn parse_global(body: &str, timestamp: DateTime<Utc>) -> Result<GlobalMarket> {
    let response: GlobalResponse =
        serde_json::from_str(body).context("unexpected coingecko global payload")?;
    let data = response.data;
    let usd = |map: &BTreeMap<String, f64>, key: &str| map.get(key).copied().unwrap_or(0.0);

    Ok(GlobalMarket {
        timestamp,
        total_market_cap_usd: usd(&data.total_market_cap, "usd"),
        total_volume_24h_usd: usd(&data.total_volume, "usd"),
        btc_dominance_percent: usd(&data.market_cap_percentage, "btc"),
        eth_dominance_percent: usd(&data.market_cap_percentage, "eth"),
        active_cryptocurrencies: data.active_cryptocurrencies,
    })
}

fn format_seconds(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Snapshot table in the layout the feature pipeline reads by default.
pub fn snapshots_to_frame(snapshots: &[MarketSnapshot]) -> PolarsResult<DataFrame> {
    let timestamp: Vec<String> = snapshots
        .iter()
        .map(|s| s.timestamp.format(TIME_FORMAT).to_string())
        .collect();
    let symbol: Vec<&str> = snapshots.iter().map(|s| s.symbol.as_str()).collect();
    let price_usd: Vec<f64> = snapshots.iter().map(|s| s.price.usd).collect();
    let market_cap: Vec<f64> = snapshots.iter().map(|s| s.price.usd_market_cap).collect();
    let volume: Vec<f64> = snapshots.iter().map(|s| s.price.usd_24h_vol).collect();
    let change: Vec<f64> = snapshots.iter().map(|s| s.price.usd_24h_change).collect();
    let last_updated: Vec<String> = snapshots
        .iter()
        .map(|s| format_seconds(s.price.last_updated_at))
        .collect();

    df!(
        "timestamp" => timestamp,
        "symbol" => symbol,
        "price_usd" => price_usd,
        "market_cap_usd" => market_cap,
        "volume_24h_usd" => volume,
        "price_change_24h_percent" => change,
        "last_updated" => last_updated,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn prices_default_missing_figures_to_zero() {
        let body = r#"{
            "bitcoin": {"usd": 61000.5, "usd_market_cap": 1.2e12, "usd_24h_vol": 3.5e10,
                        "usd_24h_change": -1.25, "last_updated_at": 1709294400},
            "cardano": {"usd": 0.71}
        }"#;
        let snapshots = parse_prices(body, now()).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].symbol, "BITCOIN");
        assert_eq!(snapshots[0].price.usd_24h_change, -1.25);
        assert_eq!(snapshots[1].symbol, "CARDANO");
        assert_eq!(snapshots[1].price.usd_24h_vol, 0.0);

        let df = snapshots_to_frame(&snapshots).unwrap();
        assert_eq!(df.shape(), (2, 7));
        let updated = df.column("last_updated").unwrap().str().unwrap();
        assert_eq!(updated.get(0), Some("2024-03-01 12:00:00"));
    }

    #[test]
    fn global_figures() {
        let body = r#"{"data": {
            "active_cryptocurrencies": 13500,
            "total_market_cap": {"usd": 2.4e12, "eur": 2.2e12},
            "total_volume": {"usd": 9.1e10},
            "market_cap_percentage": {"btc": 51.2, "eth": 16.8}
        }}"#;
        let global = parse_global(body, now()).unwrap();
        assert_eq!(global.total_market_cap_usd, 2.4e12);
        assert_eq!(global.btc_dominance_percent, 51.2);
        assert_eq!(global.eth_dominance_percent, 16.8);
        assert_eq!(global.active_cryptocurrencies, 13500);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_prices("[1, 2]", now()).is_err());
        assert!(parse_global(r#"{"status": "error"}"#, now()).is_err());
    }
}
