//! Indicator expressions over one ordered column.
//!
//! Every builder takes the input column as a polars `Expr` and returns
//! expressions to evaluate in a lazy `with_columns` on the same frame, so the
//! output keeps the input's length and row order. Window statistics use a
//! shrinking trailing window near the start of the series and skip nulls
//! inside the window.

use polars::prelude::*;

/// RSI value used where the average loss is exactly zero.
pub const RSI_NEUTRAL: f64 = 50.0;

/// `volume_ratio` above this marks a volume spike.
pub const VOLUME_SPIKE_RATIO: f64 = 2.0;

pub struct MacdLines {
    pub macd: Expr,
    pub signal: Expr,
    pub histogram: Expr,
}

pub struct BollingerBands {
    pub upper: Expr,
    pub middle: Expr,
    pub lower: Expr,
    pub width: Expr,
}

pub struct VolumeIndicators {
    pub ma_7: Expr,
    pub ma_30: Expr,
    pub ratio: Expr,
    pub change_1d: Expr,
    pub spike: Expr,
}

fn null() -> Expr {
    Expr::Literal(LiteralValue::Null)
}

/// Input column as `Float64`, with NaN read as missing.
pub fn numeric(name: &str) -> Expr {
    col(name).cast(DataType::Float64).fill_nan(null())
}

/// Replace infinities and NaN (division by zero, overflow) with null.
pub fn finite(expr: Expr) -> Expr {
    when(expr.clone().is_finite()).then(expr).otherwise(null())
}

/// 0/1 `Int32` flag; a null condition counts as 0.
pub fn flag(condition: Expr) -> Expr {
    condition.fill_null(lit(false)).cast(DataType::Int32)
}

fn window(size: usize, min_periods: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: size.max(1),
        min_periods,
        ..Default::default()
    }
}

/// Trailing mean over `size` rows, shrinking at the start. An all-null
/// window yields null.
pub fn rolling_mean(values: Expr, size: usize) -> Expr {
    values.rolling_mean(window(size, 1))
}

/// Trailing sample standard deviation (ddof = 1). Needs two present values.
pub fn rolling_std(values: Expr, size: usize) -> Expr {
    values.rolling_std(window(size, 2))
}

pub fn sma(values: Expr, size: usize) -> Expr {
    rolling_mean(values, size)
}

/// Exponentially weighted mean with `alpha = 2 / (span + 1)`, seeded by the
/// first observation, no bias adjustment. Leading nulls stay null.
pub fn ema(values: Expr, span: usize) -> Expr {
    let alpha = 2.0 / (span as f64 + 1.0);
    values.ewm_mean(EWMOptions {
        alpha,
        adjust: false,
        bias: false,
        min_periods: 1,
        ignore_nulls: false,
    })
}

/// `x[i] - x[i - periods]`, null for the first `periods` rows.
pub fn diff(values: Expr, periods: usize) -> Expr {
    values.clone() - values.shift(lit(periods as i64))
}

/// Percentage change over `periods` rows: `(x[i] / x[i - p] - 1) * 100`.
/// Null where `i < p`, where either side is null, or where the base is zero.
pub fn pct_change(values: Expr, periods: usize) -> Expr {
    let base = values.clone().shift(lit(periods as i64));
    finite((values / base - lit(1.0)) * lit(100.0))
}

/// Relative strength index over `period` rows.
///
/// Gains and losses are the positive and negated negative parts of the first
/// difference (an undefined difference counts as zero), each averaged with
/// the shrinking trailing window. Where the average loss is zero the output
/// is [`RSI_NEUTRAL`].
pub fn rsi(values: Expr, period: usize) -> Expr {
    let delta = diff(values, 1);
    let gains = when(delta.clone().gt(lit(0.0)))
        .then(delta.clone())
        .otherwise(lit(0.0));
    let losses = when(delta.clone().lt(lit(0.0)))
        .then(lit(0.0) - delta)
        .otherwise(lit(0.0));

    let avg_gain = rolling_mean(gains, period);
    let avg_loss = rolling_mean(losses, period);

    when(avg_loss.clone().eq(lit(0.0)))
        .then(lit(RSI_NEUTRAL))
        .otherwise(lit(100.0) - lit(100.0) / (lit(1.0) + avg_gain / avg_loss))
}

/// MACD line (`EMA(fast) - EMA(slow)`), its EMA signal line and the histogram.
pub fn macd(values: Expr, fast: usize, slow: usize, signal: usize) -> MacdLines {
    let line = ema(values.clone(), fast) - ema(values, slow);
    let signal = ema(line.clone(), signal);
    MacdLines {
        histogram: line.clone() - signal.clone(),
        macd: line,
        signal,
    }
}

/// Bollinger bands: `SMA(window) ± k * rolling_std(window)`, plus `upper - lower`.
pub fn bollinger(values: Expr, size: usize, k: f64) -> BollingerBands {
    let middle = rolling_mean(values.clone(), size);
    let spread = rolling_std(values, size) * lit(k);
    let upper = middle.clone() + spread.clone();
    let lower = middle.clone() - spread;
    BollingerBands {
        width: upper.clone() - lower.clone(),
        upper,
        middle,
        lower,
    }
}

/// Volume moving averages, current-to-average ratio, daily change and spike flag.
pub fn volume_indicators(volume: Expr) -> VolumeIndicators {
    let ma_7 = rolling_mean(volume.clone(), 7);
    let ratio = ratio(volume.clone(), ma_7.clone());
    VolumeIndicators {
        ma_30: rolling_mean(volume.clone(), 30),
        change_1d: pct_change(volume, 1),
        spike: flag(ratio.clone().gt(lit(VOLUME_SPIKE_RATIO))),
        ma_7,
        ratio,
    }
}

/// `numerator / denominator`; null when either side is null or the result
/// is not finite.
pub fn ratio(numerator: Expr, denominator: Expr) -> Expr {
    finite(numerator / denominator)
}
