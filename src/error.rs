//! Error type of the feature core.
//!
//! Collectors and commands report through `anyhow`; everything under
//! `features` and `table` returns [`FeatureError`] so callers can match on
//! the failing column and stage.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Technical,
    Temporal,
    Sentiment,
    Trim,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Technical => "technical",
            Stage::Temporal => "temporal",
            Stage::Sentiment => "sentiment",
            Stage::Trim => "trim",
        };
        f.write_str(name)
    }
}

/// Failures surfaced by the feature core.
///
/// Short histories, a zero RSI loss and sentiment join gaps are recovered
/// inside the stages and never show up here.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("{stage} stage: required column '{column}' is missing")]
    MissingColumn { column: String, stage: Stage },

    #[error("column '{column}' row {row}: cannot read timestamp {value:?}")]
    InvalidTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{column}' has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_column_and_stage() {
        let missing = FeatureError::MissingColumn {
            column: "close".to_string(),
            stage: Stage::Technical,
        };
        assert_eq!(
            missing.to_string(),
            "technical stage: required column 'close' is missing"
        );

        let unsupported = FeatureError::UnsupportedType {
            column: "close".to_string(),
            dtype: "str".to_string(),
        };
        assert_eq!(unsupported.to_string(), "column 'close' has unsupported type str");
        assert_eq!(Stage::Trim.to_string(), "trim");
    }
}
