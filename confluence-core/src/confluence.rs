//! Confluence Aggregator.
//!
//! Reduces the events of all detector families plus the latest volume
//! reading to one score, a classification tier and a primary direction.
//! The reduction is deterministic: families are visited in
//! [`DetectorFamily::EVALUATION_ORDER`] and events in detector order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detectors::{DetectorFamily, Event, VolumeReading};
use crate::domain::System;

/// Added when the latest volume ratio reaches [`VOLUME_BONUS_RATIO`].
pub const VOLUME_BONUS: f64 = 0.3;
pub const VOLUME_BONUS_RATIO: f64 = 1.5;

/// Tolerance for floating summation drift at tier boundaries.
const SCORE_EPSILON: f64 = 1e-9;

/// Classification tiers, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "WEAK")]
    Weak,
    #[serde(rename = "INTERESTING")]
    Interesting,
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "VERY GOOD")]
    VeryGood,
    #[serde(rename = "EXCELLENT")]
    Excellent,
    #[serde(rename = "PERFECT")]
    Perfect,
}

impl Classification {
    /// Threshold ladder, highest first. Boundaries are closed on the low side.
    pub const LADDER: [(f64, Classification); 5] = [
        (3.0, Classification::Perfect),
        (2.5, Classification::Excellent),
        (1.8, Classification::VeryGood),
        (1.2, Classification::Good),
        (0.8, Classification::Interesting),
    ];

    pub fn from_score(score: f64) -> Self {
        Self::LADDER
            .iter()
            .find(|(threshold, _)| score + SCORE_EPSILON >= *threshold)
            .map_or(Classification::Weak, |(_, class)| *class)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Perfect => "PERFECT",
            Classification::Excellent => "EXCELLENT",
            Classification::VeryGood => "VERY GOOD",
            Classification::Good => "GOOD",
            Classification::Interesting => "INTERESTING",
            Classification::Weak => "WEAK",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events grouped by detector family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyEvents {
    pub hull: Vec<Event>,
    pub awesome: Vec<Event>,
    pub alligator: Vec<Event>,
    pub ichimoku: Vec<Event>,
}

impl FamilyEvents {
    pub fn get(&self, family: DetectorFamily) -> &[Event] {
        match family {
            DetectorFamily::Hull => &self.hull,
            DetectorFamily::AwesomeOscillator => &self.awesome,
            DetectorFamily::Alligator => &self.alligator,
            DetectorFamily::Ichimoku => &self.ichimoku,
        }
    }

    pub fn get_mut(&mut self, family: DetectorFamily) -> &mut Vec<Event> {
        match family {
            DetectorFamily::Hull => &mut self.hull,
            DetectorFamily::AwesomeOscillator => &mut self.awesome,
            DetectorFamily::Alligator => &mut self.alligator,
            DetectorFamily::Ichimoku => &mut self.ichimoku,
        }
    }

    /// All events in evaluation order.
    pub fn in_order(&self) -> impl Iterator<Item = &Event> {
        DetectorFamily::EVALUATION_ORDER
            .into_iter()
            .flat_map(move |family| self.get(family).iter())
    }

    /// Number of scored events in `family`.
    pub fn scored_count(&self, family: DetectorFamily) -> usize {
        self.get(family).iter().filter(|e| e.is_scored()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceResult {
    pub score: f64,
    pub classification: Classification,
    /// System of the first scored event in evaluation order.
    pub primary_system: Option<System>,
    /// Number of scored events (volume excluded).
    pub signal_count: usize,
    pub factors: Vec<String>,
}

/// Reduce family events and the latest volume reading to a result.
pub fn aggregate(events: &FamilyEvents, latest_volume: Option<&VolumeReading>) -> ConfluenceResult {
    let mut score = 0.0;
    let mut factors = Vec::new();
    let mut primary_system = None;
    let mut signal_count = 0;

    for event in events.in_order().filter(|e| e.is_scored()) {
        score += event.strength;
        factors.push(event.description.clone());
        signal_count += 1;
        primary_system.get_or_insert(event.system);
    }

    if let Some(volume) = latest_volume {
        score += volume.strength;
        factors.push(format!("Volume: {}", volume.level));
        if volume.ratio >= VOLUME_BONUS_RATIO {
            score += VOLUME_BONUS;
            factors.push("Volume confirmation bonus".to_string());
        }
    }

    ConfluenceResult {
        score,
        classification: Classification::from_score(score),
        primary_system,
        signal_count,
        factors,
    }
}
