//! Awesome Oscillator regular divergence detector.
//!
//! Pivots are strict local extrema: a point is a pivot high (low) when it is
//! strictly greater (less) than every point within `order` bars on either
//! side. Near the ends only the neighbours that exist are compared, so a low
//! printed three bars ago can already be a pivot. The first and last points
//! never qualify.
//!
//! Bullish: two consecutive price pivot lows where price makes a lower low
//! while the matched AO pivot lows make a higher low. Bearish mirrors it on
//! pivot highs. Only the most recent qualifying pair per direction is kept.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{ensure_aligned, DetectorError, DetectorFamily, Event, EventDetector, EventKind};
use crate::domain::{Candle, System};
use crate::indicators::IndicatorSet;

pub const DIVERGENCE_STRENGTH: f64 = 0.8;

/// Pivot indices of a series, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pivots {
    pub highs: Vec<usize>,
    pub lows: Vec<usize>,
}

/// Strict local extrema with windows clipped at the series ends. NaN never
/// forms or neighbours a pivot.
pub fn find_pivots(series: &[f64], order: usize) -> Pivots {
    let n = series.len();
    let mut pivots = Pivots::default();
    if order == 0 || n < 2 * order + 1 {
        return pivots;
    }
    for i in 1..(n - 1) {
        let v = series[i];
        if v.is_nan() {
            continue;
        }
        let neighbours = series[i.saturating_sub(order)..i]
            .iter()
            .chain(series[i + 1..(i + order + 1).min(n)].iter());
        let (mut is_high, mut is_low) = (true, true);
        for &other in neighbours {
            // A NaN neighbour is unordered and vetoes both.
            match v.partial_cmp(&other) {
                Some(Ordering::Greater) => is_low = false,
                Some(Ordering::Less) => is_high = false,
                _ => {
                    is_high = false;
                    is_low = false;
                }
            }
            if !is_high && !is_low {
                break;
            }
        }
        if is_high {
            pivots.highs.push(i);
        }
        if is_low {
            pivots.lows.push(i);
        }
    }
    pivots
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceParams {
    pub min_candles: usize,
    /// Candles with a defined AO required before pivots are searched.
    pub min_defined: usize,
    pub pivot_order: usize,
    /// Max bar distance between a price pivot and its AO pivot.
    pub match_tolerance: usize,
    /// Number of most recent pivots considered per series.
    pub recent_pivots: usize,
}

impl Default for DivergenceParams {
    fn default() -> Self {
        Self {
            min_candles: 100,
            min_defined: 50,
            pivot_order: 5,
            match_tolerance: 5,
            recent_pivots: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AoDivergenceDetector {
    params: DivergenceParams,
}

impl AoDivergenceDetector {
    pub fn new(params: DivergenceParams) -> Self {
        Self { params }
    }

    /// Latest AO pivot within the tolerance of `price_pivot`.
    fn match_pivot(&self, price_pivot: usize, ao_pivots: &[usize]) -> Option<usize> {
        ao_pivots
            .iter()
            .copied()
            .rev()
            .find(|&p| p.abs_diff(price_pivot) <= self.params.match_tolerance)
    }

    fn find_divergence(
        &self,
        price: &[f64],
        ao: &[f64],
        price_pivots: &[usize],
        ao_pivots: &[usize],
        system: System,
    ) -> Option<((usize, usize), (usize, usize))> {
        let keep = self.params.recent_pivots;
        let recent_price = &price_pivots[price_pivots.len().saturating_sub(keep)..];
        let recent_ao = &ao_pivots[ao_pivots.len().saturating_sub(keep)..];
        if recent_price.len() < 2 || recent_ao.len() < 2 {
            return None;
        }

        for pair in recent_price.windows(2).rev() {
            let (p1, p2) = (pair[0], pair[1]);
            let (Some(o1), Some(o2)) = (self.match_pivot(p1, recent_ao), self.match_pivot(p2, recent_ao))
            else {
                continue;
            };
            let diverges = match system {
                System::Bullish => price[p2] < price[p1] && ao[o2] > ao[o1],
                System::Bearish => price[p2] > price[p1] && ao[o2] < ao[o1],
            };
            if diverges {
                return Some(((p1, p2), (o1, o2)));
            }
        }
        None
    }
}

impl EventDetector for AoDivergenceDetector {
    fn family(&self) -> DetectorFamily {
        DetectorFamily::AwesomeOscillator
    }

    fn warmup_candles(&self) -> usize {
        self.params.min_candles
    }

    fn detect(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Vec<Event>, DetectorError> {
        ensure_aligned(self.family(), "ao", &indicators.ao, candles)?;
        if candles.len() < self.params.min_candles {
            return Ok(Vec::new());
        }
        let Some(offset) = indicators.ao.iter().position(|v| !v.is_nan()) else {
            return Ok(Vec::new());
        };
        if candles.len() - offset < self.params.min_defined {
            return Ok(Vec::new());
        }

        let window = &candles[offset..];
        let ao = &indicators.ao[offset..];
        let lows: Vec<f64> = window.iter().map(|c| c.low).collect();
        let highs: Vec<f64> = window.iter().map(|c| c.high).collect();

        let order = self.params.pivot_order;
        let ao_pivots = find_pivots(ao, order);
        let low_pivots = find_pivots(&lows, order).lows;
        let high_pivots = find_pivots(&highs, order).highs;

        let mut events = Vec::new();
        let searches = [
            (System::Bullish, &lows, &low_pivots, &ao_pivots.lows),
            (System::Bearish, &highs, &high_pivots, &ao_pivots.highs),
        ];
        for (system, price, price_pivots, ao_side) in searches {
            let Some(((p1, p2), (o1, o2))) =
                self.find_divergence(price, ao, price_pivots, ao_side, system)
            else {
                continue;
            };
            events.push(Event {
                family: DetectorFamily::AwesomeOscillator,
                kind: EventKind::AoDivergence {
                    price_pivots: (offset + p1, offset + p2),
                    ao_pivots: (offset + o1, offset + o2),
                },
                system,
                description: format!("Regular {system} divergence detected"),
                strength: DIVERGENCE_STRENGTH,
                timestamp: window[p2].timestamp,
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorParams;

    #[test]
    fn strict_pivots() {
        let s = [1.0, 2.0, 5.0, 2.0, 1.0, 0.0, 1.0, 2.0, 2.0, 1.0];
        let p = find_pivots(&s, 2);
        assert_eq!(p.highs, vec![2]);
        assert_eq!(p.lows, vec![5]);
    }

    #[test]
    fn plateau_is_not_a_pivot() {
        let s = [1.0, 3.0, 3.0, 1.0, 0.0];
        let p = find_pivots(&s, 1);
        assert!(p.highs.is_empty());
    }

    #[test]
    fn first_and_last_never_pivot() {
        let s = [0.0, 1.0, 2.0, 3.0, 4.0];
        let p = find_pivots(&s, 2);
        assert!(p.highs.is_empty());
        assert!(p.lows.is_empty());
    }

    #[test]
    fn pivot_near_the_end_uses_existing_neighbours() {
        let s = [
            5.0, 5.1, 5.2, 5.3, 5.4, 5.5, 4.0, 3.0, 2.0, 1.5, 1.0, 1.2, 1.4, 1.6,
        ];
        let p = find_pivots(&s, 5);
        // Three bars from the end.
        assert_eq!(p.lows, vec![10]);
        assert_eq!(p.highs, vec![5]);
    }

    #[test]
    fn pivot_near_the_start_uses_existing_neighbours() {
        let s = [3.0, 9.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.4, 0.3, 0.2, 0.1];
        let p = find_pivots(&s, 5);
        assert_eq!(p.highs, vec![1]);
        assert!(p.lows.is_empty());
    }

    #[test]
    fn nan_neighbour_vetoes() {
        let s = [1.0, f64::NAN, 5.0, 1.0, 0.5];
        assert!(find_pivots(&s, 1).highs.is_empty());
        assert!(find_pivots(&[1.0; 2], 1).highs.is_empty());
    }

    fn candles_with(lows: &[f64], highs: &[f64]) -> Vec<Candle> {
        lows.iter()
            .zip(highs)
            .enumerate()
            .map(|(i, (&low, &high))| Candle {
                timestamp: 1_704_067_200 + i as i64 * 3600,
                open: 100.0,
                high,
                low,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    fn set_with_ao(candles: &[Candle], ao: Vec<f64>) -> IndicatorSet {
        let mut set = IndicatorSet::compute(candles, &IndicatorParams::default());
        set.ao = ao;
        set
    }

    fn ao_series(n: usize, points: &[(usize, f64)]) -> Vec<f64> {
        let mut ao: Vec<f64> = (0..n).map(|i| if i < 33 { f64::NAN } else { 0.0 }).collect();
        for &(i, v) in points {
            ao[i] = v;
        }
        ao
    }

    #[test]
    fn bullish_divergence() {
        let mut lows = vec![99.0; 120];
        lows[70] = 90.0;
        lows[90] = 85.0;
        let candles = candles_with(&lows, &[101.0; 120]);
        let set = set_with_ao(&candles, ao_series(120, &[(69, -5.0), (92, -3.0)]));

        let events = AoDivergenceDetector::default().detect(&candles, &set).unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.system, System::Bullish);
        assert_eq!(e.strength, 0.8);
        assert_eq!(e.timestamp, candles[90].timestamp);
        assert_eq!(
            e.kind,
            EventKind::AoDivergence {
                price_pivots: (70, 90),
                ao_pivots: (69, 92)
            }
        );
    }

    #[test]
    fn bearish_divergence() {
        let mut highs = vec![101.0; 120];
        highs[60] = 110.0;
        highs[100] = 115.0;
        let candles = candles_with(&[99.0; 120], &highs);
        let set = set_with_ao(&candles, ao_series(120, &[(61, 6.0), (98, 4.0)]));

        let events = AoDivergenceDetector::default().detect(&candles, &set).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].system, System::Bearish);
        assert_eq!(events[0].description, "Regular bearish divergence detected");
    }

    #[test]
    fn confirming_ao_is_not_divergence() {
        let mut lows = vec![99.0; 120];
        lows[70] = 90.0;
        lows[90] = 85.0;
        let candles = candles_with(&lows, &[101.0; 120]);
        let set = set_with_ao(&candles, ao_series(120, &[(69, -3.0), (92, -5.0)]));
        assert!(AoDivergenceDetector::default()
            .detect(&candles, &set)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unmatched_pivots_are_skipped() {
        let mut lows = vec![99.0; 120];
        lows[70] = 90.0;
        lows[90] = 85.0;
        let candles = candles_with(&lows, &[101.0; 120]);
        // AO pivot 8 bars away from the second price pivot.
        let set = set_with_ao(&candles, ao_series(120, &[(69, -5.0), (98, -3.0)]));
        assert!(AoDivergenceDetector::default()
            .detect(&candles, &set)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn recent_second_pivot_is_reported() {
        let mut lows = vec![99.0; 120];
        lows[80] = 90.0;
        lows[116] = 85.0;
        let candles = candles_with(&lows, &[101.0; 120]);
        let set = set_with_ao(&candles, ao_series(120, &[(79, -5.0), (117, -3.0)]));

        let events = AoDivergenceDetector::default().detect(&candles, &set).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].system, System::Bullish);
        assert_eq!(events[0].timestamp, candles[116].timestamp);
        assert_eq!(
            events[0].kind,
            EventKind::AoDivergence {
                price_pivots: (80, 116),
                ao_pivots: (79, 117)
            }
        );
    }

    #[test]
    fn latest_ao_pivot_in_tolerance_is_matched() {
        let mut lows = vec![99.0; 120];
        lows[70] = 90.0;
        lows[90] = 85.0;
        let candles = candles_with(&lows, &[101.0; 120]);
        // 88 is nearer to the price pivot at 90, but 94 comes later.
        let set = set_with_ao(
            &candles,
            ao_series(120, &[(69, -5.0), (88, -2.0), (94, -4.0)]),
        );

        let events = AoDivergenceDetector::default().detect(&candles, &set).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::AoDivergence {
                price_pivots: (70, 90),
                ao_pivots: (69, 94)
            }
        );
    }

    #[test]
    fn needs_history() {
        let candles = candles_with(&[99.0; 80], &[101.0; 80]);
        let set = IndicatorSet::compute(&candles, &IndicatorParams::default());
        assert!(AoDivergenceDetector::default()
            .detect(&candles, &set)
            .unwrap()
            .is_empty());
    }
}
