//! Indicator Library.
//!
//! Pure functions from an ordered series to an index-aligned output series.
//! Undefined ("not yet computable") entries are `f64::NAN`; scalar helpers
//! return `Option<f64>`. The single-series indicators also implement the
//! [`Indicator`] trait. Multi-line indicators (Alligator, Ichimoku) return a
//! lines struct, or `None` when the window is too short for them.
//!
//! [`IndicatorSet`] precomputes everything the detectors need once per
//! evaluation.

pub mod alligator;
pub mod awesome;
pub mod hull;
pub mod ichimoku;
pub mod sma;
pub mod wma;

pub use alligator::{alligator, AlligatorLines, AlligatorPoint, ALLIGATOR_MULTIPLIER};
pub use awesome::{awesome_oscillator, AwesomeOscillator, AO_FAST, AO_SLOW};
pub use hull::{hull_ma, hull_raw_series, hull_series, HullMa};
pub use ichimoku::{ichimoku, IchimokuLines, IchimokuParams, IchimokuPoint};
pub use sma::{median_prices, sma, sma_series};
pub use wma::{wma, wma_series};

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// Indicators take a full candle series and produce a numeric output series
/// of the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// No value at index t may depend on candle t+1 or later. Chikou is the one
/// deliberate exception and is therefore not an `Indicator`.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "hull_21", "ao_5_34").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Indicator periods used by the detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub hull_fast: usize,
    pub hull_slow: usize,
    pub ao_fast: usize,
    pub ao_slow: usize,
    pub alligator_multiplier: usize,
    pub ichimoku: IchimokuParams,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            hull_fast: 21,
            hull_slow: 34,
            ao_fast: AO_FAST,
            ao_slow: AO_SLOW,
            alligator_multiplier: ALLIGATOR_MULTIPLIER,
            ichimoku: IchimokuParams::default(),
        }
    }
}

impl IndicatorParams {
    /// Longest warmup among the single-series indicators. An invalid AO
    /// pair contributes nothing.
    pub fn max_lookback(&self) -> usize {
        let mut single: Vec<Box<dyn Indicator>> = vec![
            Box::new(HullMa::new(self.hull_fast.max(1))),
            Box::new(HullMa::new(self.hull_slow.max(1))),
        ];
        if self.ao_fast >= 1 && self.ao_slow > self.ao_fast {
            single.push(Box::new(AwesomeOscillator::new(self.ao_fast, self.ao_slow)));
        }
        single.iter().map(|i| i.lookback()).max().unwrap_or(0)
    }
}

/// Precomputed indicator series for one candle window.
///
/// Built once per evaluation, then shared read-only by every detector.
/// Every series is index-aligned with the window it was built from.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub hull_fast: Vec<f64>,
    pub hull_slow: Vec<f64>,
    pub ao: Vec<f64>,
    pub alligator: Option<AlligatorLines>,
    pub ichimoku: Option<IchimokuLines>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Self {
        let hull_fast = HullMa::new(params.hull_fast.max(1)).compute(candles);
        let hull_slow = HullMa::new(params.hull_slow.max(1)).compute(candles);
        let ao = awesome_oscillator(candles, params.ao_fast, params.ao_slow);
        Self {
            hull_fast,
            hull_slow,
            ao,
            alligator: alligator(candles, params.alligator_multiplier),
            ichimoku: ichimoku(candles, &params.ichimoku),
        }
    }

    /// Length of the window the set was computed from.
    pub fn len(&self) -> usize {
        self.hull_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hull_fast.is_empty()
    }
}

/// Create hourly synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: TEST_EPOCH + i as i64 * 3600,
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// 2024-01-01T00:00:00Z
#[cfg(test)]
pub const TEST_EPOCH: i64 = 1_704_067_200;

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
