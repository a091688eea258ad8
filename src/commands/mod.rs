//! One module per CLI subcommand.

pub mod collect;
pub mod collect_binance;
pub mod process;
pub mod view;
