//! HTTP collectors for the raw inputs of the pipeline.
//!
//! Each collector returns `anyhow::Result`. Callers log a failure and carry
//! on without that source (see [`or_absent`]).

use anyhow::Result;
use std::fmt::Display;
use std::time::Duration;
use tracing::error;

pub mod binance;
pub mod coingecko;
pub mod fear_greed;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(client)
}

/// Log a collector failure and turn it into "no data".
pub fn or_absent<T>(source: impl Display, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(source = %source, "collection failed: {e:#}");
            None
        }
    }
}
