//! Crypto market feature engineering.
//!
//! Raw price tables (CoinGecko snapshots or exchange candles) and the daily
//! Fear & Greed index go in; one feature table per asset comes out, with
//! technical indicators, calendar fields, sentiment features and lags.

pub mod collectors;
pub mod commands;
pub mod config;
pub mod error;
pub mod features;
pub mod kline;
pub mod storage;
pub mod table;
pub mod utils;

pub use error::{FeatureError, Result, Stage};
pub use features::{
    build_features, split_by_symbol, FeatureConfig, FeaturePipeline, FeatureTable, PriceSchema,
};
pub use storage::{CsvStore, TableStore};
