//! Hull Moving Average (HMA).
//!
//! `raw = 2 * WMA(half) - WMA(period)` computed as a full series, then
//! smoothed with `WMA(raw, round(sqrt(period)))`. The smoothing pass is part
//! of the definition; the unsmoothed `raw` value lags differently and must
//! never be reported as the Hull value.
//!
//! half = floor(period / 2), smoothing = round(sqrt(period)).
//! Lookback: (period - 1) + (smoothing - 1).

use super::wma::wma_series;
use super::Indicator;
use crate::domain::Candle;

/// Unsmoothed intermediate series `2 * WMA(half) - WMA(period)`.
pub fn hull_raw_series(series: &[f64], period: usize) -> Vec<f64> {
    let half = wma_series(series, (period / 2).max(1));
    let full = wma_series(series, period);
    half.iter()
        .zip(full.iter())
        .map(|(h, f)| 2.0 * h - f)
        .collect()
}

/// Full Hull series aligned with `series`.
pub fn hull_series(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; series.len()];
    }
    let raw = hull_raw_series(series, period);
    wma_series(&raw, smoothing_period(period))
}

/// Latest Hull value, `None` while still warming up.
pub fn hull_ma(series: &[f64], period: usize) -> Option<f64> {
    hull_series(series, period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
}

pub fn smoothing_period(period: usize) -> usize {
    ((period as f64).sqrt().round() as usize).max(1)
}

/// Hull MA on close prices.
#[derive(Debug, Clone)]
pub struct HullMa {
    period: usize,
    name: String,
}

impl HullMa {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Hull period must be >= 1");
        Self {
            period,
            name: format!("hull_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for HullMa {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.period - 1) + (smoothing_period(self.period) - 1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        hull_series(&closes, self.period)
    }
}
