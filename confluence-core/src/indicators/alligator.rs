//! Alligator lines: three SMAs of median price.
//!
//! jaw = SMA(median, 13 * m), teeth = SMA(median, 8 * m), lips = SMA(median, 5 * m).
//! The lines are only produced once the jaw can be computed at the latest
//! candle (`len >= 13 * m`).

use serde::{Deserialize, Serialize};

use super::sma::{median_prices, sma_series};
use crate::domain::Candle;

pub const ALLIGATOR_MULTIPLIER: usize = 10;

/// Index-aligned jaw/teeth/lips series.
#[derive(Debug, Clone, PartialEq)]
pub struct AlligatorLines {
    pub jaw: Vec<f64>,
    pub teeth: Vec<f64>,
    pub lips: Vec<f64>,
}

/// Jaw/teeth/lips at one index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlligatorPoint {
    pub jaw: f64,
    pub teeth: f64,
    pub lips: f64,
}

impl AlligatorLines {
    pub fn len(&self) -> usize {
        self.jaw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jaw.is_empty()
    }

    /// Values at `i`, `None` if any line is undefined there.
    pub fn at(&self, i: usize) -> Option<AlligatorPoint> {
        let point = AlligatorPoint {
            jaw: *self.jaw.get(i)?,
            teeth: *self.teeth.get(i)?,
            lips: *self.lips.get(i)?,
        };
        if point.jaw.is_nan() || point.teeth.is_nan() || point.lips.is_nan() {
            return None;
        }
        Some(point)
    }

    pub fn latest(&self) -> Option<AlligatorPoint> {
        self.len().checked_sub(1).and_then(|i| self.at(i))
    }
}

impl AlligatorPoint {
    /// `(max - min) / max` across the three lines.
    pub fn spread(&self) -> f64 {
        let max = self.jaw.max(self.teeth).max(self.lips);
        let min = self.jaw.min(self.teeth).min(self.lips);
        if max <= 0.0 {
            return 0.0;
        }
        (max - min) / max
    }
}

/// Compute the Alligator lines, `None` when `len < 13 * multiplier`.
pub fn alligator(candles: &[Candle], multiplier: usize) -> Option<AlligatorLines> {
    if multiplier == 0 || candles.len() < 13 * multiplier {
        return None;
    }
    let median = median_prices(candles);
    Some(AlligatorLines {
        jaw: sma_series(&median, 13 * multiplier),
        teeth: sma_series(&median, 8 * multiplier),
        lips: sma_series(&median, 5 * multiplier),
    })
}
