//! Settings file (`config.toml`).
//!
//! Every section is optional; a missing file yields the defaults. API
//! credentials are never read from here, only from the environment.

use crate::collectors::fear_greed::{DEFAULT_FEAR_GREED_URL, MAX_HISTORY_DAYS};
use crate::features::FeatureConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const FEAR_GREED_URL_ENV: &str = "FEAR_GREED_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub market: MarketSettings,
    pub sentiment: SentimentSettings,
    pub features: FeatureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    /// CoinGecko coin ids.
    pub coins: Vec<String>,
    /// Exchange trading pairs.
    pub pairs: Vec<String>,
    pub timeframe: String,
    pub days_back: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            coins: ["bitcoin", "ethereum", "binancecoin", "solana", "cardano"]
                .map(String::from)
                .to_vec(),
            pairs: ["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "ADAUSDT"]
                .map(String::from)
                .to_vec(),
            timeframe: "1d".to_string(),
            days_back: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSettings {
    pub url: String,
    pub history_days: u32,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEAR_GREED_URL.to_string(),
            history_days: MAX_HISTORY_DAYS,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Problem opening config file {}", path.display()))?;
        let settings = toml::from_str(&text)
            .with_context(|| format!("Problem parsing config file {}", path.display()))?;
        Ok(settings)
    }

    /// Sentiment endpoint, with the environment taking precedence.
    pub fn fear_greed_url(&self) -> String {
        std::env::var(FEAR_GREED_URL_ENV).unwrap_or_else(|_| self.sentiment.url.clone())
    }
}
