//! Event Detectors.
//!
//! One detector per indicator family. A detector reads the candle window and
//! the precomputed [`IndicatorSet`] and emits zero or more [`Event`]s. Not
//! enough history is never an error: the detector simply returns no events.
//! A [`DetectorError`] means the inputs were inconsistent; the engine logs it
//! and treats the family as silent.
//!
//! The volume detector is not an [`EventDetector`]: it produces
//! [`VolumeReading`]s, of which only the latest feeds the confluence score.

pub mod alligator;
pub mod divergence;
pub mod hull;
pub mod ichimoku;
pub mod volume;

pub use alligator::{
    AlligatorDetector, AlligatorParams, AlligatorPhase, AlligatorReport, AlligatorState,
    AlligatorTransition, PriceZone, TransitionKind, Trend,
};
pub use divergence::{find_pivots, AoDivergenceDetector, DivergenceParams, Pivots};
pub use hull::{HullDetector, HullLine, HullParams};
pub use ichimoku::{CloudColor, CloudColorChange, IchimokuDetector, IchimokuEventParams, KijunSide};
pub use volume::{VolumeDetector, VolumeLevel, VolumeParams, VolumeReading};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{Candle, System};
use crate::indicators::IndicatorSet;

/// Detector families in confluence evaluation order.
///
/// The primary system of a confluence result is taken from the first scored
/// event in this order, so the order is part of the output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    Hull,
    AwesomeOscillator,
    Alligator,
    Ichimoku,
}

impl DetectorFamily {
    pub const EVALUATION_ORDER: [DetectorFamily; 4] = [
        DetectorFamily::Hull,
        DetectorFamily::AwesomeOscillator,
        DetectorFamily::Alligator,
        DetectorFamily::Ichimoku,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectorFamily::Hull => "hull",
            DetectorFamily::AwesomeOscillator => "ao",
            DetectorFamily::Alligator => "alligator",
            DetectorFamily::Ichimoku => "ichimoku",
        }
    }
}

impl fmt::Display for DetectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Close crossed Hull-21 between the previous and the latest candle.
    HullBreak { price: f64, hull: f64 },
    /// Price retested a Hull line after a Hull-21/Hull-34 cross.
    HullCrossRetest {
        line: HullLine,
        price: f64,
        hours_ago: f64,
    },
    /// Close moved into the zone between the red (lips) and blue (jaw) lines.
    AlligatorZoneEntry { price: f64, hours_ago: f64 },
    /// Close left the red-blue zone.
    AlligatorZoneExit {
        toward: PriceZone,
        price: f64,
        hours_ago: f64,
    },
    /// Close within 0.2% of the jaw.
    AlligatorBlueLineContact { price: f64, hours_ago: f64 },
    /// Close returned inside a newly recoloured cloud.
    CloudRetest {
        color: CloudColor,
        price: f64,
        hours_ago: f64,
    },
    /// High/low range contained the Kijun.
    KijunTouch {
        side: KijunSide,
        price: f64,
        kijun: f64,
        hours_ago: f64,
    },
    /// Regular divergence between price pivots and AO pivots.
    AoDivergence {
        price_pivots: (usize, usize),
        ao_pivots: (usize, usize),
    },
}

impl EventKind {
    /// Whether the event contributes to the confluence score.
    ///
    /// Zone exits are shown with the Alligator context but never scored.
    pub fn is_scored(&self) -> bool {
        !matches!(self, EventKind::AlligatorZoneExit { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::HullBreak { .. } => "hull_break",
            EventKind::HullCrossRetest { .. } => "hull_cross_retest",
            EventKind::AlligatorZoneEntry { .. } => "alligator_zone_entry",
            EventKind::AlligatorZoneExit { .. } => "alligator_zone_exit",
            EventKind::AlligatorBlueLineContact { .. } => "alligator_blue_line_contact",
            EventKind::CloudRetest { .. } => "cloud_retest",
            EventKind::KijunTouch { .. } => "kijun_touch",
            EventKind::AoDivergence { .. } => "ao_divergence",
        }
    }
}

/// A typed, timestamped, strength-scored detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub family: DetectorFamily,
    #[serde(flatten)]
    pub kind: EventKind,
    pub system: System,
    pub description: String,
    /// In `[0, 1]`.
    pub strength: f64,
    /// Timestamp of the candle the event refers to.
    pub timestamp: i64,
}

impl Event {
    pub fn is_scored(&self) -> bool {
        self.kind.is_scored()
    }
}

/// Unexpected computational failure inside one detector family.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("{family}: {series} series has {actual} values, window has {expected}")]
    SeriesLengthMismatch {
        family: DetectorFamily,
        series: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{family}: invalid parameter {name}: {reason}")]
    InvalidParameter {
        family: DetectorFamily,
        name: &'static str,
        reason: String,
    },
}

/// A detector for one indicator family.
///
/// Implementations are pure: same window and indicator set in, same events
/// out. They never see storage or the watchlist.
pub trait EventDetector: Send + Sync {
    fn family(&self) -> DetectorFamily;

    /// Candles required before the detector can emit anything.
    fn warmup_candles(&self) -> usize;

    /// Detect events over `candles`. `indicators` must have been computed
    /// from exactly this window.
    fn detect(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Vec<Event>, DetectorError>;
}

/// Check that an indicator series is aligned with the window.
pub(crate) fn ensure_aligned(
    family: DetectorFamily,
    series: &'static str,
    values: &[f64],
    candles: &[Candle],
) -> Result<(), DetectorError> {
    if values.len() != candles.len() {
        return Err(DetectorError::SeriesLengthMismatch {
            family,
            series,
            expected: candles.len(),
            actual: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_order_is_stable() {
        let mut sorted = DetectorFamily::EVALUATION_ORDER;
        sorted.sort();
        assert_eq!(sorted, DetectorFamily::EVALUATION_ORDER);
        assert_eq!(DetectorFamily::EVALUATION_ORDER[0], DetectorFamily::Hull);
        assert_eq!(DetectorFamily::EVALUATION_ORDER[3], DetectorFamily::Ichimoku);
    }

    #[test]
    fn zone_exit_is_not_scored() {
        let exit = EventKind::AlligatorZoneExit {
            toward: PriceZone::AboveRed,
            price: 1.0,
            hours_ago: 0.0,
        };
        assert!(!exit.is_scored());
        assert!(EventKind::HullBreak {
            price: 1.0,
            hull: 1.0
        }
        .is_scored());
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = Event {
            family: DetectorFamily::Hull,
            kind: EventKind::HullBreak {
                price: 101.0,
                hull: 100.0,
            },
            system: System::Bullish,
            description: "First close above Hull 21".into(),
            strength: 0.7,
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "hull_break");
        assert_eq!(json["system"], "bullish");
        assert_eq!(json["family"], "hull");
    }

    #[test]
    fn alignment_check() {
        let err = ensure_aligned(DetectorFamily::Hull, "hull_fast", &[1.0], &[]).unwrap_err();
        assert!(err.to_string().contains("hull_fast"));
    }
}
