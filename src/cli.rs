use clap::{Parser, Subcommand};
use crypto_features::commands::{self, process::Source};
use crypto_features::config::{Settings, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crypto_features")]
#[command(about = "Crypto market data collection and feature engineering", long_about = None)]
pub struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect CoinGecko prices and the Fear & Greed history
    Collect,
    /// Collect exchange candles for every configured pair
    CollectBinance {
        /// Days of history to fetch
        #[arg(short, long)]
        days: Option<u32>,
        /// Candle interval (1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w)
        #[arg(short, long)]
        timeframe: Option<String>,
    },
    /// Build feature tables from the newest raw files
    Process {
        #[arg(short, long, value_enum, default_value_t = Source::Coingecko)]
        source: Source,
        /// Skip the lag features
        #[arg(long)]
        no_lags: bool,
    },
    /// Summarize the newest feature table of each asset
    View,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Collect => commands::collect::run(&settings).await,
        Commands::CollectBinance { days, timeframe } => {
            commands::collect_binance::run(&settings, days, timeframe.as_deref()).await
        }
        Commands::Process { source, no_lags } => commands::process::run(&settings, source, no_lags),
        Commands::View => commands::view::run(&settings),
    }
}
