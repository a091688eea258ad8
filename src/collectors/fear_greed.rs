//! Daily Fear & Greed index from alternative.me.

use crate::features::SentimentRow;
use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use polars::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_FEAR_GREED_URL: &str = "https://api.alternative.me/fng/";
/// The endpoint serves at most a year of daily readings per request.
pub const MAX_HISTORY_DAYS: u32 = 365;
const MAX_VALUE: u8 = 100;

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    data: Vec<FearGreedEntry>,
}

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
    value_classification: String,
    /// Unix seconds, sent as a string.
    timestamp: String,
}

pub struct FearGreedClient {
    client: reqwest::Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            url: url.into(),
        })
    }

    pub async fn fetch_current(&self) -> Result<Vec<SentimentRow>> {
        let url = Url::parse(&self.url)?;
        self.fetch(url).await
    }

    /// Up to `days` daily readings, capped at [`MAX_HISTORY_DAYS`].
    pub async fn fetch_history(&self, days: u32) -> Result<Vec<SentimentRow>> {
        let limit = days.min(MAX_HISTORY_DAYS);
        let url = Url::parse_with_params(&self.url, &[("limit", limit.to_string())])?;
        self.fetch(url).await
    }

    async fn fetch(&self, url: Url) -> Result<Vec<SentimentRow>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context("fear & greed request failed")?
            .error_for_status()?
            .text()
            .await?;
        let rows = parse(&body)?;
        info!(rows = rows.len(), "fear & greed readings fetched");
        Ok(rows)
    }
}

/// Decode a response body into readings sorted by date.
pub fn parse(body: &str) -> Result<Vec<SentimentRow>> {
    let response: FearGreedResponse =
        serde_json::from_str(body).context("unexpected fear & greed payload")?;

    let mut rows = Vec::with_capacity(response.data.len());
    for entry in response.data {
        let value: u8 = entry
            .value
            .parse()
            .with_context(|| format!("bad sentiment value {:?}", entry.value))?;
        if value > MAX_VALUE {
            bail!("sentiment value {value} is outside 0..={MAX_VALUE}");
        }
        let seconds: i64 = entry
            .timestamp
            .parse()
            .with_context(|| format!("bad sentiment timestamp {:?}", entry.timestamp))?;
        let date = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| anyhow!("sentiment timestamp out of range: {seconds}"))?
            .date_naive();

        let row = SentimentRow::new(date, value);
        let label = entry.value_classification.to_lowercase().replace(' ', "_");
        if label != row.classification.as_str() {
            warn!(
                %date,
                value,
                api = %entry.value_classification,
                local = %row.classification,
                "classification differs from local buckets"
            );
        }
        rows.push(row);
    }
    rows.sort_by_key(|row| row.date);
    Ok(rows)
}

/// Sentiment table with `timestamp` (date), `value` and `classification`.
pub fn sentiment_frame(rows: &[SentimentRow]) -> PolarsResult<DataFrame> {
    let timestamp: Vec<String> = rows
        .iter()
        .map(|row| row.date.format("%Y-%m-%d").to_string())
        .collect();
    let value: Vec<i64> = rows.iter().map(|row| i64::from(row.value)).collect();
    let classification: Vec<&str> = rows
        .iter()
        .map(|row| row.classification.as_str())
        .collect();

    df!(
        "timestamp" => timestamp,
        "value" => value,
        "classification" => classification,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SentimentClass;
    use chrono::NaiveDate;

    const BODY: &str = r#"{
        "name": "Fear and Greed Index",
        "data": [
            {"value": "72", "value_classification": "Greed", "timestamp": "1704153600", "time_until_update": "3600"},
            {"value": "20", "value_classification": "Extreme Fear", "timestamp": "1704067200"}
        ],
        "metadata": {"error": null}
    }"#;

    #[test]
    fn parses_and_sorts_by_date() {
        let rows = parse(BODY).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(rows[0].value, 20);
        assert_eq!(rows[0].classification, SentimentClass::ExtremeFear);
        assert_eq!(rows[1].classification, SentimentClass::Greed);
    }

    #[test]
    fn rejects_non_numeric_value() {
        let body = BODY.replace("\"72\"", "\"high\"");
        assert!(parse(&body).is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        let body = BODY.replace("\"72\"", "\"101\"");
        let err = parse(&body).unwrap_err();
        assert!(err.to_string().contains("101"));

        let body = BODY.replace("\"72\"", "\"100\"");
        assert_eq!(parse(&body).unwrap()[1].value, 100);
    }

    #[test]
    fn frame_layout() {
        let rows = parse(BODY).unwrap();
        let df = sentiment_frame(&rows).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["timestamp", "value", "classification"]
        );
        let classes: Vec<&str> = df
            .column("classification")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(classes, vec!["extreme_fear", "greed"]);
    }
}
