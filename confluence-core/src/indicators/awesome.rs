//! Awesome Oscillator (AO).
//!
//! SMA(median, fast) - SMA(median, slow) with median = (high + low) / 2.
//! Lookback: slow - 1.

use super::sma::{median_prices, sma_series};
use super::Indicator;
use crate::domain::Candle;

pub const AO_FAST: usize = 5;
pub const AO_SLOW: usize = 34;

#[derive(Debug, Clone)]
pub struct AwesomeOscillator {
    fast: usize,
    slow: usize,
    name: String,
}

impl AwesomeOscillator {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1 && slow > fast, "AO requires 1 <= fast < slow");
        Self {
            fast,
            slow,
            name: format!("ao_{fast}_{slow}"),
        }
    }
}

impl Default for AwesomeOscillator {
    fn default() -> Self {
        Self::new(AO_FAST, AO_SLOW)
    }
}

impl Indicator for AwesomeOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        awesome_oscillator(candles, self.fast, self.slow)
    }
}

/// AO series aligned with `candles`.
pub fn awesome_oscillator(candles: &[Candle], fast: usize, slow: usize) -> Vec<f64> {
    let median = median_prices(candles);
    let fast_ma = sma_series(&median, fast);
    let slow_ma = sma_series(&median, slow);
    fast_ma
        .iter()
        .zip(slow_ma.iter())
        .map(|(f, s)| f - s)
        .collect()
}
