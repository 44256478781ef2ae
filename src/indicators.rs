//! Technical indicators over the live total line
//!
//! EMA and MACD are backed by the `ta` crate, whose exponential moving average
//! is seeded with the first observation (not an SMA of the first `period`
//! points). That matters here because the line tape is short: a dozen samples
//! rather than hundreds of candles.
//!
//! RSI uses a plain trailing-window average of gains and losses, and reports
//! `None` until the series is longer than the period.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use ta::indicators::{ExponentialMovingAverage, MovingAverageConvergenceDivergence};
use ta::Next;

use crate::config::IndicatorConfig;

/// Floor for the average loss so a loss-free window does not divide by zero
pub const RSI_LOSS_EPSILON: f64 = 1e-6;

/// Default periods used when callers have no configuration at hand
pub const DEFAULT_MACD: (usize, usize, usize) = (12, 26, 9);
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Per-point MACD output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Exponential moving average, one output per input point.
///
/// `k = 2 / (period + 1)`, seeded with the first value. An empty input or a
/// zero period yields an empty series.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![],
    };

    values.iter().map(|&v| indicator.next(v)).collect()
}

/// MACD line (fast EMA - slow EMA), its signal EMA and the histogram
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    if values.is_empty() {
        return MacdSeries::default();
    }

    let mut indicator = match MovingAverageConvergenceDivergence::new(fast, slow, signal) {
        Ok(i) => i,
        Err(_) => return MacdSeries::default(),
    };

    let mut out = MacdSeries {
        macd: Vec::with_capacity(values.len()),
        signal: Vec::with_capacity(values.len()),
        histogram: Vec::with_capacity(values.len()),
    };

    for &value in values {
        let point = indicator.next(value);
        out.macd.push(point.macd);
        out.signal.push(point.signal);
        out.histogram.push(point.histogram);
    }

    out
}

// =============================================================================
// Momentum
// =============================================================================

/// Relative Strength Index over the trailing `period` differences.
///
/// Returns `None` when `values.len() <= period`; insufficient history is
/// never reported as an RSI of 0. The loss average is floored at
/// `RSI_LOSS_EPSILON`, so a window with no movement at all reads 0.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() <= period {
        return None;
    }

    let start = (values.len() - period).max(1);
    let (gains, losses) = values[start - 1..]
        .iter()
        .tuple_windows()
        .map(|(prev, next)| next - prev)
        .fold((0.0, 0.0), |(g, l), diff| {
            if diff > 0.0 {
                (g + diff, l)
            } else {
                (g, l - diff)
            }
        });

    let effective = (values.len() - start) as f64;
    let avg_gain = gains / effective;
    let avg_loss = (losses / effective).max(RSI_LOSS_EPSILON);
    let rs = avg_gain / avg_loss;

    Some(100.0 - 100.0 / (1.0 + rs))
}

// =============================================================================
// Bundle and technical bias
// =============================================================================

/// Latest value of every indicator for one evaluation tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorBundle {
    pub fn compute(closes: &[f64], cfg: &IndicatorConfig) -> Self {
        let macd_series = macd(closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);

        IndicatorBundle {
            ema_short: ema(closes, cfg.ema_short).last().copied(),
            ema_long: ema(closes, cfg.ema_long).last().copied(),
            macd: macd_series.macd.last().copied(),
            macd_signal: macd_series.signal.last().copied(),
            macd_histogram: macd_series.histogram.last().copied(),
            rsi: rsi(closes, cfg.rsi_period),
        }
    }
}

/// Directional bias read from the indicator bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveSignal {
    OverBias,
    UnderBias,
    NoBet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub live_signal: LiveSignal,
    pub comment: String,
    pub indicators: IndicatorBundle,
}

impl TechnicalSignal {
    /// OVER when short EMA leads, MACD is above signal and RSI is not yet
    /// overbought; UNDER symmetrically. RSI must be defined for either bias.
    pub fn from_bundle(bundle: IndicatorBundle, cfg: &IndicatorConfig) -> Self {
        let (live_signal, comment) = match (
            bundle.ema_short,
            bundle.ema_long,
            bundle.macd,
            bundle.macd_signal,
            bundle.rsi,
        ) {
            (Some(short), Some(long), Some(m), Some(sig), Some(rsi))
                if short > long && m > sig && rsi < cfg.rsi_overbought =>
            {
                (
                    LiveSignal::OverBias,
                    "Bullish momentum on the live total (short EMA above long EMA, MACD above signal).",
                )
            }
            (Some(short), Some(long), Some(m), Some(sig), Some(rsi))
                if short < long && m < sig && rsi > cfg.rsi_oversold =>
            {
                (
                    LiveSignal::UnderBias,
                    "Bearish momentum on the live total (short EMA below long EMA, MACD below signal).",
                )
            }
            _ => (
                LiveSignal::NoBet,
                "No clear technical signal on the live total.",
            ),
        };

        TechnicalSignal {
            live_signal,
            comment: comment.to_string(),
            indicators: bundle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_ema_period_one_on_constant_series() {
        let values = vec![221.5; 8];
        let result = ema(&values, 1);
        assert_eq!(result.len(), 8);
        for v in result {
            assert_abs_diff_eq!(v, 221.5);
        }
    }

    #[test]
    fn test_ema_seeds_with_first_value() {
        let values = vec![10.0, 20.0, 30.0];
        let result = ema(&values, 3);
        // k = 0.5
        assert_abs_diff_eq!(result[0], 10.0);
        assert_abs_diff_eq!(result[1], 15.0);
        assert_abs_diff_eq!(result[2], 22.5);
    }

    #[test]
    fn test_ema_degenerate_inputs() {
        assert!(ema(&[], 5).is_empty());
        assert!(ema(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_macd_is_fast_minus_slow() {
        let values: Vec<f64> = (0..30).map(|i| 220.0 + i as f64 * 0.5).collect();
        let series = macd(&values, 12, 26, 9);
        let fast = ema(&values, 12);
        let slow = ema(&values, 26);
        let last = values.len() - 1;
        assert_relative_eq!(series.macd[last], fast[last] - slow[last], epsilon = 1e-9);
        assert_relative_eq!(
            series.histogram[last],
            series.macd[last] - series.signal[last],
            epsilon = 1e-9
        );
        assert!(series.macd[last] > 0.0);
    }

    #[test]
    fn test_macd_on_constant_series_is_flat() {
        let series = macd(&[220.0; 10], 12, 26, 9);
        for v in series.histogram {
            assert_abs_diff_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_rsi_needs_more_points_than_period() {
        let values: Vec<f64> = (0..14).map(|i| i as f64).collect();
        assert_eq!(rsi(&values, 14), None);
        assert_eq!(rsi(&values, 0), None);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let values: Vec<f64> = (0..15).map(|i| 200.0 + i as f64).collect();
        let value = rsi(&values, 14).unwrap();
        assert_relative_eq!(value, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let values: Vec<f64> = (0..15).map(|i| 230.0 - i as f64).collect();
        assert_abs_diff_eq!(rsi(&values, 14).unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_uses_only_trailing_window() {
        // Early crash is outside the trailing 2 diffs: +1, -1 -> RSI 50
        let values = vec![240.0, 200.0, 201.0, 200.0];
        assert_abs_diff_eq!(rsi(&values, 2).unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_flat_window_reads_zero() {
        assert_abs_diff_eq!(rsi(&[220.0; 10], 7).unwrap(), 0.0);
    }

    #[test]
    fn test_flat_tape_has_no_bias() {
        let cfg = IndicatorConfig::default();
        let bundle = IndicatorBundle::compute(&[220.0; 12], &cfg);
        assert_eq!(bundle.rsi, Some(0.0));
        let signal = TechnicalSignal::from_bundle(bundle, &cfg);
        assert_eq!(signal.live_signal, LiveSignal::NoBet);
    }

    #[test]
    fn test_technical_signal_over_bias_on_uptrend() {
        let cfg = IndicatorConfig::default();
        // Rising with pullbacks keeps RSI under 70
        let values = vec![
            220.0, 221.0, 220.3, 221.3, 220.6, 221.6, 220.9, 221.9, 221.2, 222.2, 221.5, 222.5,
        ];
        let bundle = IndicatorBundle::compute(&values, &cfg);
        let rsi = bundle.rsi.unwrap();
        assert!(rsi < 70.0, "rsi was {rsi}");
        let signal = TechnicalSignal::from_bundle(bundle, &cfg);
        assert_eq!(signal.live_signal, LiveSignal::OverBias);
    }

    #[test]
    fn test_technical_signal_needs_rsi() {
        let cfg = IndicatorConfig::default();
        let bundle = IndicatorBundle::compute(&[220.0, 221.0, 222.0], &cfg);
        assert_eq!(bundle.rsi, None);
        let signal = TechnicalSignal::from_bundle(bundle, &cfg);
        assert_eq!(signal.live_signal, LiveSignal::NoBet);
    }
}
