//! Hull break and cross-retest detector.
//!
//! Break: the close crosses Hull-21 between the previous and the latest
//! candle (from `<=` to `>` is bullish, from `>=` to `<` is bearish).
//!
//! Cross-retest: a Hull-21/Hull-34 cross inside the lookback, followed within
//! `retest_window` candles by a candle whose range holds Hull-34 (or, failing
//! that, Hull-21) with the close on the support side for a bullish cross or
//! the resistance side for a bearish one. Only the first retest inside the
//! recency window is reported per cross.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ensure_aligned, DetectorError, DetectorFamily, Event, EventDetector, EventKind};
use crate::domain::{hours_between, Candle, System};
use crate::indicators::IndicatorSet;

pub const BREAK_STRENGTH: f64 = 0.7;
pub const SLOW_RETEST_STRENGTH: f64 = 0.8;
pub const FAST_RETEST_STRENGTH: f64 = 0.6;

/// Candles at the end of the window that cannot host a cross.
const CROSS_EXCLUSION: usize = 5;

/// Which Hull line was retested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HullLine {
    Fast,
    Slow,
}

impl fmt::Display for HullLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HullLine::Fast => f.write_str("Hull 21"),
            HullLine::Slow => f.write_str("Hull 34"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HullParams {
    pub cross_lookback: usize,
    pub retest_window: usize,
    pub retest_recency_hours: f64,
}

impl Default for HullParams {
    fn default() -> Self {
        Self {
            cross_lookback: 20,
            retest_window: 15,
            retest_recency_hours: 12.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HullDetector {
    params: HullParams,
}

impl HullDetector {
    pub fn new(params: HullParams) -> Self {
        Self { params }
    }

    fn detect_break(&self, candles: &[Candle], hull: &[f64]) -> Option<Event> {
        let n = candles.len();
        if n < 3 {
            return None;
        }
        let (prev, last) = (&candles[n - 2], &candles[n - 1]);
        let (prev_hull, last_hull) = (hull[n - 2], hull[n - 1]);
        if prev_hull.is_nan() || last_hull.is_nan() {
            return None;
        }

        let (system, description) = if last.close > last_hull && prev.close <= prev_hull {
            (System::Bullish, "First close above Hull 21")
        } else if last.close < last_hull && prev.close >= prev_hull {
            (System::Bearish, "First close below Hull 21")
        } else {
            return None;
        };

        Some(Event {
            family: DetectorFamily::Hull,
            kind: EventKind::HullBreak {
                price: last.close,
                hull: last_hull,
            },
            system,
            description: description.to_string(),
            strength: BREAK_STRENGTH,
            timestamp: last.timestamp,
        })
    }

    fn detect_cross_retests(&self, candles: &[Candle], fast: &[f64], slow: &[f64]) -> Vec<Event> {
        let n = candles.len();
        let lookback = self.params.cross_lookback;
        if n < lookback || n <= CROSS_EXCLUSION {
            return Vec::new();
        }
        let now = candles[n - 1].timestamp;
        let start = (n - lookback).max(1);
        let mut events = Vec::new();

        for i in start..(n - CROSS_EXCLUSION) {
            let (f0, s0, f1, s1) = (fast[i - 1], slow[i - 1], fast[i], slow[i]);
            if f0.is_nan() || s0.is_nan() || f1.is_nan() || s1.is_nan() {
                continue;
            }
            let system = if f1 > s1 && f0 <= s0 {
                System::Bullish
            } else if f1 < s1 && f0 >= s0 {
                System::Bearish
            } else {
                continue;
            };

            let end = (i + self.params.retest_window + 1).min(n);
            for j in (i + 1)..end {
                let Some((line, strength)) = retest_at(&candles[j], fast[j], slow[j], system) else {
                    continue;
                };
                let hours_ago = hours_between(candles[j].timestamp, now);
                if hours_ago > self.params.retest_recency_hours {
                    continue;
                }
                let role = match system {
                    System::Bullish => "support",
                    System::Bearish => "resistance",
                };
                events.push(Event {
                    family: DetectorFamily::Hull,
                    kind: EventKind::HullCrossRetest {
                        line,
                        price: candles[j].close,
                        hours_ago,
                    },
                    system,
                    description: format!("{line} {role} retest after cross"),
                    strength,
                    timestamp: candles[j].timestamp,
                });
                break;
            }
        }
        events
    }
}

/// Retest of the slow line first, then the fast line.
fn retest_at(candle: &Candle, fast: f64, slow: f64, system: System) -> Option<(HullLine, f64)> {
    if fast.is_nan() || slow.is_nan() {
        return None;
    }
    let holds = |level: f64| match system {
        System::Bullish => candle.touches(level) && candle.close >= level,
        System::Bearish => candle.touches(level) && candle.close <= level,
    };
    if holds(slow) {
        Some((HullLine::Slow, SLOW_RETEST_STRENGTH))
    } else if holds(fast) {
        Some((HullLine::Fast, FAST_RETEST_STRENGTH))
    } else {
        None
    }
}

impl EventDetector for HullDetector {
    fn family(&self) -> DetectorFamily {
        DetectorFamily::Hull
    }

    fn warmup_candles(&self) -> usize {
        3
    }

    fn detect(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Vec<Event>, DetectorError> {
        ensure_aligned(self.family(), "hull_fast", &indicators.hull_fast, candles)?;
        ensure_aligned(self.family(), "hull_slow", &indicators.hull_slow, candles)?;

        let mut events = Vec::new();
        if let Some(event) = self.detect_break(candles, &indicators.hull_fast) {
            events.push(event);
        }
        events.extend(self.detect_cross_retests(candles, &indicators.hull_fast, &indicators.hull_slow));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, IndicatorParams};

    fn flat_set(n: usize, fast: Vec<f64>, slow: Vec<f64>) -> IndicatorSet {
        let mut set = IndicatorSet::compute(&make_candles(&vec![100.0; n]), &IndicatorParams::default());
        set.hull_fast = fast;
        set.hull_slow = slow;
        set
    }

    #[test]
    fn bullish_break() {
        let mut closes = vec![100.0; 30];
        closes[28] = 99.0;
        closes[29] = 101.0;
        let candles = make_candles(&closes);
        let set = flat_set(30, vec![100.0; 30], vec![100.0; 30]);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        let brk = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::HullBreak { .. }))
            .unwrap();
        assert_eq!(brk.system, System::Bullish);
        assert_eq!(brk.strength, 0.7);
        assert_eq!(brk.timestamp, candles[29].timestamp);
    }

    #[test]
    fn bearish_break_from_equal() {
        let mut closes = vec![100.0; 30];
        closes[29] = 98.0;
        let candles = make_candles(&closes);
        let set = flat_set(30, vec![100.0; 30], vec![100.0; 30]);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].system, System::Bearish);
        assert_eq!(events[0].description, "First close below Hull 21");
    }

    #[test]
    fn no_break_when_staying_above() {
        let closes = vec![102.0; 30];
        let candles = make_candles(&closes);
        let set = flat_set(30, vec![100.0; 30], vec![100.0; 30]);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn no_break_while_warming_up() {
        let candles = make_candles(&[99.0, 99.0, 101.0]);
        let set = flat_set(3, vec![f64::NAN, f64::NAN, 100.0], vec![f64::NAN; 3]);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        assert!(events.is_empty());
    }

    /// Fast line crosses above slow at `cross`, slow sits at 100 and every
    /// candle range (99..101) contains it.
    fn cross_fixture(n: usize, cross: usize) -> (Vec<Candle>, IndicatorSet) {
        let candles = make_candles(&vec![100.0; n]);
        let fast: Vec<f64> = (0..n)
            .map(|i| if i < cross { 99.0 } else { 100.5 })
            .collect();
        (candles, flat_set(n, fast, vec![100.0; n]))
    }

    #[test]
    fn cross_then_slow_line_retest() {
        let (candles, set) = cross_fixture(40, 30);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        let retests: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::HullCrossRetest { .. }))
            .collect();
        assert_eq!(retests.len(), 1, "only the first retest per cross");
        let r = retests[0];
        assert_eq!(r.system, System::Bullish);
        assert_eq!(r.strength, 0.8);
        assert_eq!(r.description, "Hull 34 support retest after cross");
        assert_eq!(r.timestamp, candles[31].timestamp);
        match r.kind {
            EventKind::HullCrossRetest { line, hours_ago, .. } => {
                assert_eq!(line, HullLine::Slow);
                assert_eq!(hours_ago, 8.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn stale_retests_are_skipped() {
        // Cross at 22: candles 23..=26 are older than 12h, candle 27 sits
        // exactly on the recency boundary.
        let (candles, set) = cross_fixture(40, 22);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        let r = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::HullCrossRetest { .. }))
            .unwrap();
        assert_eq!(r.timestamp, candles[27].timestamp);
    }

    #[test]
    fn recent_cross_is_ignored() {
        let (candles, set) = cross_fixture(40, 36);
        let events = HullDetector::default().detect(&candles, &set).unwrap();
        assert!(events
            .iter()
            .all(|e| !matches!(e.kind, EventKind::HullCrossRetest { .. })));
    }

    #[test]
    fn misaligned_series_is_an_error() {
        let candles = make_candles(&[100.0; 10]);
        let set = flat_set(9, vec![100.0; 9], vec![100.0; 9]);
        assert!(matches!(
            HullDetector::default().detect(&candles, &set),
            Err(DetectorError::SeriesLengthMismatch { .. })
        ));
    }
}
