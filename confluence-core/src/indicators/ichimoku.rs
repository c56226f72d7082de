//! Ichimoku components.
//!
//! Tenkan/Kijun/Senkou B are the midpoint of the rolling high/low over their
//! period; Senkou A is the mean of Tenkan and Kijun. Spans are evaluated at
//! the current index, not plotted forward. Chikou at `i` is the close
//! `displacement` candles later, so its trailing entries are undefined.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Ichimoku periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IchimokuParams {
    pub conversion: usize,
    pub base: usize,
    pub lead_b: usize,
    pub displacement: usize,
}

impl Default for IchimokuParams {
    fn default() -> Self {
        Self {
            conversion: 20,
            base: 60,
            lead_b: 120,
            displacement: 30,
        }
    }
}

impl IchimokuParams {
    /// Candles required before the indicator is produced.
    pub fn required_candles(&self) -> usize {
        self.lead_b + self.displacement
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuLines {
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub chikou: Vec<f64>,
}

/// Latest Ichimoku values, for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IchimokuPoint {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

impl IchimokuLines {
    pub fn len(&self) -> usize {
        self.kijun.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kijun.is_empty()
    }

    /// Cloud edges `(lower, upper)` at `i`.
    pub fn cloud_bounds(&self, i: usize) -> Option<(f64, f64)> {
        let a = *self.senkou_a.get(i)?;
        let b = *self.senkou_b.get(i)?;
        if a.is_nan() || b.is_nan() {
            return None;
        }
        Some((a.min(b), a.max(b)))
    }

    pub fn latest(&self) -> Option<IchimokuPoint> {
        let i = self.len().checked_sub(1)?;
        let point = IchimokuPoint {
            tenkan: self.tenkan[i],
            kijun: self.kijun[i],
            senkou_a: self.senkou_a[i],
            senkou_b: self.senkou_b[i],
        };
        if point.senkou_a.is_nan() || point.senkou_b.is_nan() || point.kijun.is_nan() {
            return None;
        }
        Some(point)
    }
}

/// Compute Ichimoku, `None` when `len < lead_b + displacement`.
pub fn ichimoku(candles: &[Candle], params: &IchimokuParams) -> Option<IchimokuLines> {
    if params.conversion == 0 || params.base == 0 || params.lead_b == 0 {
        return None;
    }
    if candles.len() < params.required_candles() {
        return None;
    }
    let tenkan = midpoint_series(candles, params.conversion);
    let kijun = midpoint_series(candles, params.base);
    let senkou_a = tenkan
        .iter()
        .zip(kijun.iter())
        .map(|(t, k)| (t + k) / 2.0)
        .collect();
    let senkou_b = midpoint_series(candles, params.lead_b);

    let n = candles.len();
    let chikou = (0..n)
        .map(|i| {
            candles
                .get(i + params.displacement)
                .map_or(f64::NAN, |c| c.close)
        })
        .collect();

    Some(IchimokuLines {
        tenkan,
        kijun,
        senkou_a,
        senkou_b,
        chikou,
    })
}

/// `(highest high + lowest low) / 2` over a trailing window.
fn midpoint_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &candles[i + 1 - period..=i];
        let high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        result[i] = (high + low) / 2.0;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn ichimoku_needs_150_candles() {
        let params = IchimokuParams::default();
        assert_eq!(params.required_candles(), 150);
        assert!(ichimoku(&make_candles(&vec![100.0; 149]), &params).is_none());
        assert!(ichimoku(&make_candles(&vec![100.0; 150]), &params).is_some());
    }

    #[test]
    fn spans_on_flat_series() {
        let lines = ichimoku(&make_candles(&vec![100.0; 160]), &IchimokuParams::default()).unwrap();
        let p = lines.latest().unwrap();
        assert_approx(p.tenkan, 100.0, DEFAULT_EPSILON);
        assert_approx(p.kijun, 100.0, DEFAULT_EPSILON);
        assert_approx(p.senkou_a, 100.0, DEFAULT_EPSILON);
        assert_approx(p.senkou_b, 100.0, DEFAULT_EPSILON);
        assert_eq!(lines.cloud_bounds(159), Some((100.0, 100.0)));
    }

    #[test]
    fn senkou_a_is_mean_of_tenkan_kijun() {
        let closes: Vec<f64> = (0..160).map(|i| 100.0 + (i as f64 * 0.2).sin() * 5.0).collect();
        let lines = ichimoku(&make_candles(&closes), &IchimokuParams::default()).unwrap();
        for i in 59..160 {
            assert_approx(
                lines.senkou_a[i],
                (lines.tenkan[i] + lines.kijun[i]) / 2.0,
                DEFAULT_EPSILON,
            );
        }
        assert!(lines.senkou_b[118].is_nan());
        assert!(!lines.senkou_b[119].is_nan());
    }

    #[test]
    fn chikou_shifts_close_back() {
        let closes: Vec<f64> = (0..160).map(|i| 100.0 + i as f64).collect();
        let lines = ichimoku(&make_candles(&closes), &IchimokuParams::default()).unwrap();
        assert_approx(lines.chikou[0], closes[30], DEFAULT_EPSILON);
        assert_approx(lines.chikou[129], closes[159], DEFAULT_EPSILON);
        assert!(lines.chikou[130].is_nan());
    }
}
