//! `view`: console summary of the newest feature table of each asset.

use crate::config::Settings;
use crate::storage::{CsvStore, TableStore};
use anyhow::Result;
use polars::prelude::*;
use std::collections::BTreeSet;

const FEATURES_MARKER: &str = "_features_";
const PRICE_COLUMNS: [&str; 2] = ["price_usd", "close"];
const SHOWN_PER_CATEGORY: usize = 5;

const CATEGORIES: [(&str, &[&str]); 5] = [
    ("Price & volume", &["price", "volume", "market"]),
    ("Technical", &["sma", "ema", "rsi", "macd", "bb"]),
    ("Temporal", &["year", "month", "day", "hour", "quarter", "weekend"]),
    ("Sentiment", &["fear", "greed", "fg", "neutral"]),
    ("Lag", &["lag"]),
];

pub fn run(settings: &Settings) -> Result<()> {
    let store = CsvStore::new(&settings.storage.processed_dir);

    let symbols: BTreeSet<String> = store
        .files()?
        .iter()
        .filter_map(|path| path.file_name()?.to_str())
        .filter_map(|name| name.split_once(FEATURES_MARKER))
        .map(|(symbol, _)| symbol.to_string())
        .collect();

    if symbols.is_empty() {
        println!("⚠️  No feature files in {}. Run 'process' first.", store.dir().display());
        return Ok(());
    }

    println!("📁 {} assets with features\n", symbols.len());
    for symbol in &symbols {
        let Some((path, df)) = store.load_latest(&format!("{symbol}{FEATURES_MARKER}"))? else {
            continue;
        };
        println!("═══════════════════════════════════════════════════════════");
        println!("💰 {}  ({})", symbol.to_uppercase(), path.display());
        println!("═══════════════════════════════════════════════════════════");
        show_table(&df)?;
        println!();
    }
    Ok(())
}

fn show_table(df: &DataFrame) -> Result<()> {
    println!("📊 Shape: {} rows × {} columns", df.height(), df.width());

    let columns = df.get_column_names();
    for (category, names) in categorize(&columns) {
        if names.is_empty() {
            continue;
        }
        println!("\n  {} ({}):", category, names.len());
        for name in names.iter().take(SHOWN_PER_CATEGORY) {
            match last_value(df, name) {
                Some(value) => println!("    • {:<30} = {:.2}", name, value),
                None => println!("    • {:<30} = -", name),
            }
        }
        if names.len() > SHOWN_PER_CATEGORY {
            println!("    ... and {} more", names.len() - SHOWN_PER_CATEGORY);
        }
    }

    if let Some(price) = PRICE_COLUMNS.iter().find(|c| columns.contains(*c)) {
        let stats = df
            .clone()
            .lazy()
            .select([
                col(price).cast(DataType::Float64).min().alias("min"),
                col(price).cast(DataType::Float64).max().alias("max"),
                col(price).cast(DataType::Float64).mean().alias("mean"),
            ])
            .collect()?;
        let stat = |name: &str| first_value(&stats, name).unwrap_or(f64::NAN);
        println!(
            "\n💵 {}: min {:.2}  max {:.2}  mean {:.2}",
            price,
            stat("min"),
            stat("max"),
            stat("mean")
        );
    }

    println!("\n🎯 Latest signals:");
    for line in signals(df) {
        println!("    {line}");
    }
    Ok(())
}

/// Group column names by keyword; each column lands in the first matching
/// category, and anything unmatched goes to "Other".
pub fn categorize(columns: &[&str]) -> Vec<(&'static str, Vec<String>)> {
    let mut groups: Vec<(&'static str, Vec<String>)> = CATEGORIES
        .iter()
        .map(|(name, _)| (*name, Vec::new()))
        .chain(std::iter::once(("Other", Vec::new())))
        .collect();

    for column in columns {
        let lower = column.to_lowercase();
        let slot = CATEGORIES
            .iter()
            .position(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .unwrap_or(CATEGORIES.len());
        groups[slot].1.push(column.to_string());
    }
    groups
}

pub fn rsi_signal(rsi: f64) -> &'static str {
    if rsi < 30.0 {
        "oversold"
    } else if rsi > 70.0 {
        "overbought"
    } else {
        "neutral"
    }
}

/// Human-readable RSI, crossover and sentiment readings for the last row.
pub fn signals(df: &DataFrame) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(rsi) = last_value(df, "rsi_14") {
        lines.push(format!("RSI = {:.1} → {}", rsi, rsi_signal(rsi)));
    }
    if let Some(crossover) = last_value(df, "sma_crossover") {
        if crossover == 1.0 {
            lines.push("SMA crossover → golden cross (uptrend)".to_string());
        } else {
            lines.push("SMA crossover → death cross (downtrend)".to_string());
        }
    }
    let index = last_value(df, "fear_greed_index");
    if let Some(fg) = index.filter(|_| last_value(df, "is_extreme_fear") == Some(1.0)) {
        lines.push(format!("Extreme fear ({fg:.0}) → contrarian buy zone"));
    }
    if let Some(fg) = index.filter(|_| last_value(df, "is_extreme_greed") == Some(1.0)) {
        lines.push(format!("Extreme greed ({fg:.0}) → correction risk"));
    }
    lines
}

fn last_value(df: &DataFrame, name: &str) -> Option<f64> {
    let series = df.column(name).ok()?.cast(&DataType::Float64).ok()?;
    let last = series.len().checked_sub(1)?;
    series.f64().ok()?.get(last)
}

fn first_value(df: &DataFrame, name: &str) -> Option<f64> {
    let series = df.column(name).ok()?.cast(&DataType::Float64).ok()?;
    series.f64().ok()?.get(0)
}
