//! Exchange candles from the public Binance REST API.

use crate::kline::{format_time, Kline, Timeframe};
use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const KLINES_URL: &str = "https://api.binance.com/api/v3/klines";
const PAGE_LIMIT: usize = 1000;
const PAGE_DELAY: Duration = Duration::from_millis(200);

pub struct BinanceClient {
    client: reqwest::Client,
    klines_url: String,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            klines_url: KLINES_URL.to_string(),
        })
    }

    /// Fetch klines between `start_time` and `end_time` (milliseconds),
    /// 1000 candles per request.
    pub async fn fetch_klines_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Kline>> {
        info!(
            symbol,
            %timeframe,
            from = %format_time(start_time),
            to = %format_time(end_time),
            "fetching klines"
        );

        let mut all = Vec::new();
        let mut current_start = start_time;
        let mut batch_num = 0;

        loop {
            batch_num += 1;
            let url = Url::parse_with_params(
                &self.klines_url,
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.as_str().to_string()),
                    ("startTime", current_start.to_string()),
                    ("endTime", end_time.to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ],
            )?;

            let klines: Vec<Kline> = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("klines request for {symbol} failed"))?
                .error_for_status()?
                .json()
                .await
                .with_context(|| format!("unexpected klines payload for {symbol}"))?;

            let batch_len = klines.len();
            let Some(last_close) = klines.last().map(|k| k.close_time) else {
                debug!("no more klines returned, stopping");
                break;
            };
            all.extend(klines);
            debug!(batch = batch_num, fetched = batch_len, total = all.len(), "kline batch");

            if batch_len < PAGE_LIMIT {
                break;
            }

            // Next page starts after the last candle's close.
            current_start = last_close + 1;
            if current_start >= end_time {
                break;
            }

            tokio::time::sleep(PAGE_DELAY).await;
        }

        info!(symbol, total = all.len(), "klines fetched");
        Ok(all)
    }

    /// The last `days_back` days of candles, sorted and without duplicate open times.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        days_back: u32,
    ) -> Result<Vec<Kline>> {
        let now = Utc::now().timestamp_millis();
        let start_time = now - i64::from(days_back) * Timeframe::D1.millis();

        let mut klines = self
            .fetch_klines_range(symbol, timeframe, start_time, now)
            .await?;
        klines.sort_by_key(|k| k.open_time);
        klines.dedup_by_key(|k| k.open_time);
        Ok(klines)
    }
}
