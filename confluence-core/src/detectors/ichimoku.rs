//! Ichimoku cloud detector: colour changes, cloud retests, Kijun touches.
//!
//! Colour changes are context. Retests of a newly recoloured cloud and
//! touches of the Kijun in the last few candles are scored.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DetectorError, DetectorFamily, Event, EventDetector, EventKind};
use crate::domain::{hours_between, Candle, System};
use crate::indicators::{IchimokuLines, IndicatorSet};

pub const COLOR_CHANGE_STRENGTH: f64 = 0.8;
pub const CLOUD_RETEST_STRENGTH: f64 = 0.9;
pub const KIJUN_TOUCH_STRENGTH: f64 = 0.7;

/// Sign of `SenkouA - SenkouB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudColor {
    Green,
    Red,
    Neutral,
}

impl CloudColor {
    pub fn from_spans(senkou_a: f64, senkou_b: f64) -> Option<Self> {
        if senkou_a.is_nan() || senkou_b.is_nan() {
            None
        } else if senkou_a > senkou_b {
            Some(CloudColor::Green)
        } else if senkou_a < senkou_b {
            Some(CloudColor::Red)
        } else {
            Some(CloudColor::Neutral)
        }
    }

    pub fn system(self) -> Option<System> {
        match self {
            CloudColor::Green => Some(System::Bullish),
            CloudColor::Red => Some(System::Bearish),
            CloudColor::Neutral => None,
        }
    }
}

impl fmt::Display for CloudColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudColor::Green => f.write_str("green"),
            CloudColor::Red => f.write_str("red"),
            CloudColor::Neutral => f.write_str("neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KijunSide {
    Support,
    Resistance,
}

impl fmt::Display for KijunSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KijunSide::Support => f.write_str("support"),
            KijunSide::Resistance => f.write_str("resistance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudColorChange {
    pub from: CloudColor,
    pub to: CloudColor,
    /// Window index of the first candle with the new colour.
    pub index: usize,
    pub timestamp: i64,
    pub hours_ago: f64,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IchimokuEventParams {
    pub color_change_lookback: usize,
    pub color_change_recency_hours: f64,
    pub retest_window: usize,
    /// Changes this close to the end of the window are not scanned for retests.
    pub retest_exclusion: usize,
    pub retest_recency_hours: f64,
    pub kijun_lookback: usize,
}

impl Default for IchimokuEventParams {
    fn default() -> Self {
        Self {
            color_change_lookback: 20,
            color_change_recency_hours: 48.0,
            retest_window: 20,
            retest_exclusion: 5,
            retest_recency_hours: 24.0,
            kijun_lookback: 6,
        }
    }
}

/// Full Ichimoku output for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IchimokuReport {
    pub current_color: Option<CloudColor>,
    pub color_changes: Vec<CloudColorChange>,
    /// Cloud retests followed by Kijun touches.
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default)]
pub struct IchimokuDetector {
    params: IchimokuEventParams,
}

impl IchimokuDetector {
    pub fn new(params: IchimokuEventParams) -> Self {
        Self { params }
    }

    pub fn analyze(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<IchimokuReport>, DetectorError> {
        let Some(lines) = indicators.ichimoku.as_ref() else {
            return Ok(None);
        };
        if lines.len() != candles.len() {
            return Err(DetectorError::SeriesLengthMismatch {
                family: DetectorFamily::Ichimoku,
                series: "ichimoku",
                expected: candles.len(),
                actual: lines.len(),
            });
        }
        let n = candles.len();
        if n == 0 {
            return Ok(None);
        }
        let color_changes = self.color_changes(candles, lines);
        let mut events = self.cloud_retests(candles, lines, &color_changes);
        events.extend(self.kijun_touches(candles, lines));

        Ok(Some(IchimokuReport {
            current_color: CloudColor::from_spans(lines.senkou_a[n - 1], lines.senkou_b[n - 1]),
            color_changes,
            events,
        }))
    }

    /// Colour flips inside the lookback and recency windows.
    pub fn color_changes(&self, candles: &[Candle], lines: &IchimokuLines) -> Vec<CloudColorChange> {
        let n = candles.len();
        let lookback = self.params.color_change_lookback;
        if n < lookback || n == 0 {
            return Vec::new();
        }
        let now = candles[n - 1].timestamp;
        let color = |i: usize| CloudColor::from_spans(lines.senkou_a[i], lines.senkou_b[i]);

        let mut changes = Vec::new();
        for i in (n - lookback).max(1)..n {
            let (Some(from), Some(to)) = (color(i - 1), color(i)) else {
                continue;
            };
            if from == to {
                continue;
            }
            let hours_ago = hours_between(candles[i].timestamp, now);
            if hours_ago > self.params.color_change_recency_hours {
                continue;
            }
            changes.push(CloudColorChange {
                from,
                to,
                index: i,
                timestamp: candles[i].timestamp,
                hours_ago,
                strength: COLOR_CHANGE_STRENGTH,
            });
        }
        changes
    }

    fn cloud_retests(
        &self,
        candles: &[Candle],
        lines: &IchimokuLines,
        changes: &[CloudColorChange],
    ) -> Vec<Event> {
        let n = candles.len();
        let now = candles[n - 1].timestamp;
        let mut events = Vec::new();

        for change in changes {
            if change.index + self.params.retest_exclusion >= n {
                continue;
            }
            let Some(system) = change.to.system() else {
                continue;
            };
            let end = (change.index + self.params.retest_window).min(n);
            for i in (change.index + 1)..end {
                let Some((bottom, top)) = lines.cloud_bounds(i) else {
                    continue;
                };
                let price = candles[i].close;
                if price < bottom || price > top {
                    continue;
                }
                let hours_ago = hours_between(candles[i].timestamp, now);
                if hours_ago > self.params.retest_recency_hours {
                    continue;
                }
                events.push(Event {
                    family: DetectorFamily::Ichimoku,
                    kind: EventKind::CloudRetest {
                        color: change.to,
                        price,
                        hours_ago,
                    },
                    system,
                    description: format!("Price retested newly formed {} cloud", change.to),
                    strength: CLOUD_RETEST_STRENGTH,
                    timestamp: candles[i].timestamp,
                });
                break;
            }
        }
        events
    }

    fn kijun_touches(&self, candles: &[Candle], lines: &IchimokuLines) -> Vec<Event> {
        let n = candles.len();
        let lookback = self.params.kijun_lookback;
        if n < lookback {
            return Vec::new();
        }
        let now = candles[n - 1].timestamp;
        let mut events = Vec::new();

        for (i, candle) in candles.iter().enumerate().skip(n - lookback) {
            let kijun = lines.kijun[i];
            if kijun.is_nan() || !candle.touches(kijun) {
                continue;
            }
            let (side, system) = if candle.close > kijun {
                (KijunSide::Support, System::Bullish)
            } else {
                (KijunSide::Resistance, System::Bearish)
            };
            events.push(Event {
                family: DetectorFamily::Ichimoku,
                kind: EventKind::KijunTouch {
                    side,
                    price: candle.close,
                    kijun,
                    hours_ago: hours_between(candle.timestamp, now),
                },
                system,
                description: format!("Price touched Kijun-sen as {side}"),
                strength: KIJUN_TOUCH_STRENGTH,
                timestamp: candle.timestamp,
            });
        }
        events
    }
}

impl EventDetector for IchimokuDetector {
    fn family(&self) -> DetectorFamily {
        DetectorFamily::Ichimoku
    }

    fn warmup_candles(&self) -> usize {
        150
    }

    fn detect(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Vec<Event>, DetectorError> {
        Ok(self
            .analyze(candles, indicators)?
            .map(|report| report.events)
            .unwrap_or_default())
    }
}
