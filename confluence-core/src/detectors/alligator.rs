//! Alligator state, transition and retracement-zone detector.
//!
//! State per candle: `sleeping` when the line spread is at most the
//! threshold, otherwise `awake` with a trend taken from the line ordering.
//! Transitions between sleeping and awake are confirmed when the new phase
//! holds for the next `min(3, remaining)` candles; only the most recent
//! confirmed one is kept, as context.
//!
//! Zones follow the current trend, with the jaw as the blue line and the lips
//! as the red line. Zone entries and blue-line contacts are scored; exits are
//! context only.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DetectorError, DetectorFamily, Event, EventDetector, EventKind};
use crate::domain::{hours_between, Candle, System};
use crate::indicators::{AlligatorLines, AlligatorPoint, IndicatorSet};

pub const ZONE_ENTRY_STRENGTH: f64 = 0.7;
pub const BLUE_LINE_CONTACT_STRENGTH: f64 = 0.9;
pub const ZONE_EXIT_STRENGTH: f64 = 0.6;
pub const WAKE_UP_STRENGTH: f64 = 0.7;
pub const FALL_ASLEEP_STRENGTH: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlligatorPhase {
    /// Lines not yet defined.
    Unknown,
    Sleeping,
    Awake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Mixed,
}

impl Trend {
    pub fn system(self) -> Option<System> {
        match self {
            Trend::Bullish => Some(System::Bullish),
            Trend::Bearish => Some(System::Bearish),
            Trend::Mixed => None,
        }
    }
}

/// Alligator state at one candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlligatorState {
    pub phase: AlligatorPhase,
    /// Only set while awake.
    pub trend: Option<Trend>,
    /// `(max - min) / max` in percent.
    pub spread_pct: f64,
}

impl AlligatorState {
    pub const UNKNOWN: AlligatorState = AlligatorState {
        phase: AlligatorPhase::Unknown,
        trend: None,
        spread_pct: 0.0,
    };

    /// Classify one set of line values.
    pub fn classify(point: Option<AlligatorPoint>, sleep_threshold_pct: f64) -> Self {
        let Some(p) = point else {
            return Self::UNKNOWN;
        };
        if p.jaw.max(p.teeth).max(p.lips) <= 0.0 {
            return Self::UNKNOWN;
        }
        let spread_pct = p.spread() * 100.0;
        if spread_pct <= sleep_threshold_pct {
            return Self {
                phase: AlligatorPhase::Sleeping,
                trend: None,
                spread_pct,
            };
        }
        let trend = if p.lips > p.teeth && p.teeth > p.jaw {
            Trend::Bullish
        } else if p.lips < p.teeth && p.teeth < p.jaw {
            Trend::Bearish
        } else {
            Trend::Mixed
        };
        Self {
            phase: AlligatorPhase::Awake,
            trend: Some(trend),
            spread_pct,
        }
    }

    /// Directional trend while awake and ordered.
    pub fn trend_system(&self) -> Option<System> {
        match self.phase {
            AlligatorPhase::Awake => self.trend.and_then(Trend::system),
            _ => None,
        }
    }
}

impl fmt::Display for AlligatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.trend) {
            (AlligatorPhase::Unknown, _) => f.write_str("unknown"),
            (AlligatorPhase::Sleeping, _) => write!(f, "sleeping ({:.3}%)", self.spread_pct),
            (AlligatorPhase::Awake, Some(trend)) => {
                let t = match trend {
                    Trend::Bullish => "bullish",
                    Trend::Bearish => "bearish",
                    Trend::Mixed => "mixed",
                };
                write!(f, "awake {t} ({:.3}%)", self.spread_pct)
            }
            (AlligatorPhase::Awake, None) => write!(f, "awake ({:.3}%)", self.spread_pct),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    SleepingToAwake,
    AwakeToSleeping,
}

/// Most recent confirmed phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlligatorTransition {
    pub kind: TransitionKind,
    pub description: String,
    pub strength: f64,
    pub timestamp: i64,
    pub hours_ago: f64,
}

/// Price position relative to the red (lips) and blue (jaw) lines, seen from
/// the trend direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceZone {
    AboveRed,
    AtBlueLine,
    BelowBlue,
    BetweenRedBlue,
    Unknown,
}

impl PriceZone {
    pub fn classify(price: f64, point: &AlligatorPoint, trend: System, tolerance: f64) -> Self {
        let red = point.lips;
        let blue = point.jaw;
        let at_blue = blue != 0.0 && ((price - blue) / blue).abs() < tolerance;
        match trend {
            System::Bullish => {
                if price > red {
                    PriceZone::AboveRed
                } else if at_blue {
                    PriceZone::AtBlueLine
                } else if price < blue {
                    PriceZone::BelowBlue
                } else if red >= price && price >= blue {
                    PriceZone::BetweenRedBlue
                } else {
                    PriceZone::Unknown
                }
            }
            System::Bearish => {
                if price < red {
                    PriceZone::AboveRed
                } else if at_blue {
                    PriceZone::AtBlueLine
                } else if price > blue {
                    PriceZone::BelowBlue
                } else if red <= price && price <= blue {
                    PriceZone::BetweenRedBlue
                } else {
                    PriceZone::Unknown
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlligatorParams {
    /// Spread (percent of the top line) at or below which the Alligator sleeps.
    pub sleep_threshold_pct: f64,
    pub transition_lookback: usize,
    pub confirmation_candles: usize,
    pub zone_lookback: usize,
    /// Relative distance to the jaw that counts as blue-line contact.
    pub blue_line_tolerance: f64,
    pub zone_recency_hours: f64,
}

impl Default for AlligatorParams {
    fn default() -> Self {
        Self {
            sleep_threshold_pct: 0.15,
            transition_lookback: 10,
            confirmation_candles: 3,
            zone_lookback: 20,
            blue_line_tolerance: 0.002,
            zone_recency_hours: 10.0,
        }
    }
}

/// Full Alligator output for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlligatorReport {
    pub state: AlligatorState,
    pub transition: Option<AlligatorTransition>,
    /// Zone events inside the recency window, in candle order.
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default)]
pub struct AlligatorDetector {
    params: AlligatorParams,
}

impl AlligatorDetector {
    pub fn new(params: AlligatorParams) -> Self {
        Self { params }
    }

    /// State at every index of the window.
    pub fn states(&self, lines: &AlligatorLines) -> Vec<AlligatorState> {
        (0..lines.len())
            .map(|i| AlligatorState::classify(lines.at(i), self.params.sleep_threshold_pct))
            .collect()
    }

    /// State, transition and zone events, or `None` when the lines are not
    /// available for this window.
    pub fn analyze(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<AlligatorReport>, DetectorError> {
        let Some(lines) = indicators.alligator.as_ref() else {
            return Ok(None);
        };
        if lines.len() != candles.len() {
            return Err(DetectorError::SeriesLengthMismatch {
                family: DetectorFamily::Alligator,
                series: "alligator",
                expected: candles.len(),
                actual: lines.len(),
            });
        }
        let states = self.states(lines);
        let Some(&state) = states.last() else {
            return Ok(None);
        };
        let phases: Vec<AlligatorPhase> = states.iter().map(|s| s.phase).collect();
        let transition = self.find_transition(&phases, candles);
        let events = match state.trend_system() {
            Some(trend) => self.zone_events(candles, lines, trend),
            None => Vec::new(),
        };
        Ok(Some(AlligatorReport {
            state,
            transition,
            events,
        }))
    }

    /// Most recent confirmed sleeping/awake transition inside the lookback.
    pub fn find_transition(
        &self,
        phases: &[AlligatorPhase],
        candles: &[Candle],
    ) -> Option<AlligatorTransition> {
        let lookback = self.params.transition_lookback;
        if phases.len() < lookback || candles.len() != phases.len() || lookback == 0 {
            return None;
        }
        let start = phases.len() - lookback;
        let recent = &phases[start..];
        let now = candles[candles.len() - 1].timestamp;

        let mut latest = None;
        for i in 1..recent.len() {
            let kind = match (recent[i - 1], recent[i]) {
                (AlligatorPhase::Awake, AlligatorPhase::Sleeping) => TransitionKind::AwakeToSleeping,
                (AlligatorPhase::Sleeping, AlligatorPhase::Awake) => TransitionKind::SleepingToAwake,
                _ => continue,
            };
            let check = self.params.confirmation_candles.min(recent.len() - i - 1);
            let confirmed = recent[i + 1..=i + check].iter().all(|p| *p == recent[i]);
            if !confirmed {
                continue;
            }
            let timestamp = candles[start + i].timestamp;
            let (description, strength) = match kind {
                TransitionKind::SleepingToAwake => {
                    ("Market broke out of consolidation", WAKE_UP_STRENGTH)
                }
                TransitionKind::AwakeToSleeping => {
                    ("Market entered consolidation phase", FALL_ASLEEP_STRENGTH)
                }
            };
            latest = Some(AlligatorTransition {
                kind,
                description: description.to_string(),
                strength,
                timestamp,
                hours_ago: hours_between(timestamp, now),
            });
        }
        latest
    }

    fn zone_events(&self, candles: &[Candle], lines: &AlligatorLines, trend: System) -> Vec<Event> {
        let n = candles.len();
        let lookback = self.params.zone_lookback;
        if n < lookback {
            return Vec::new();
        }
        let now = candles[n - 1].timestamp;
        let tolerance = self.params.blue_line_tolerance;
        let zone_at = |i: usize| {
            lines
                .at(i)
                .map(|p| PriceZone::classify(candles[i].close, &p, trend, tolerance))
        };

        let mut events = Vec::new();
        for i in (n - lookback)..n {
            let Some(zone) = zone_at(i) else {
                continue;
            };
            let candle = &candles[i];
            let hours_ago = hours_between(candle.timestamp, now);
            if hours_ago > self.params.zone_recency_hours {
                continue;
            }
            let price = candle.close;
            let prev = if i > 0 { zone_at(i - 1) } else { None };

            if let Some(prev) = prev.filter(|p| *p != zone) {
                if zone == PriceZone::BetweenRedBlue {
                    events.push(self.event(
                        EventKind::AlligatorZoneEntry { price, hours_ago },
                        trend,
                        "Price entered red-blue zone".to_string(),
                        ZONE_ENTRY_STRENGTH,
                        candle.timestamp,
                    ));
                } else if prev == PriceZone::BetweenRedBlue {
                    let (system, description) = match zone {
                        PriceZone::AboveRed => {
                            (trend, format!("Price broke past red line ({trend} exit)"))
                        }
                        PriceZone::BelowBlue => (
                            trend.opposite(),
                            format!("Price broke past blue line ({} exit)", trend.opposite()),
                        ),
                        _ => (trend, "Price left red-blue zone".to_string()),
                    };
                    events.push(self.event(
                        EventKind::AlligatorZoneExit {
                            toward: zone,
                            price,
                            hours_ago,
                        },
                        system,
                        description,
                        ZONE_EXIT_STRENGTH,
                        candle.timestamp,
                    ));
                }
            }

            if zone == PriceZone::AtBlueLine {
                events.push(self.event(
                    EventKind::AlligatorBlueLineContact { price, hours_ago },
                    trend,
                    "Price touched blue line".to_string(),
                    BLUE_LINE_CONTACT_STRENGTH,
                    candle.timestamp,
                ));
            }
        }
        events
    }

    fn event(
        &self,
        kind: EventKind,
        system: System,
        description: String,
        strength: f64,
        timestamp: i64,
    ) -> Event {
        Event {
            family: DetectorFamily::Alligator,
            kind,
            system,
            description,
            strength,
            timestamp,
        }
    }
}

impl EventDetector for AlligatorDetector {
    fn family(&self) -> DetectorFamily {
        DetectorFamily::Alligator
    }

    fn warmup_candles(&self) -> usize {
        130
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
