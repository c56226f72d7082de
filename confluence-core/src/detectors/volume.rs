//! Volume climax detector.
//!
//! Baseline = mean volume over the trailing `min(baseline_window, len)`
//! candles (the current candle included), requiring at least `min_samples`.
//! Each of the last `readings` candles gets a ratio and a level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeLevel {
    Normal,
    Warming,
    Hot,
    Climax,
}

impl VolumeLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 3.0 {
            VolumeLevel::Climax
        } else if ratio >= 2.0 {
            VolumeLevel::Hot
        } else if ratio >= 1.5 {
            VolumeLevel::Warming
        } else {
            VolumeLevel::Normal
        }
    }

    pub fn strength(self) -> f64 {
        match self {
            VolumeLevel::Normal => 0.2,
            VolumeLevel::Warming => 0.6,
            VolumeLevel::Hot => 0.8,
            VolumeLevel::Climax => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VolumeLevel::Normal => "NORMAL",
            VolumeLevel::Warming => "WARMING",
            VolumeLevel::Hot => "HOT",
            VolumeLevel::Climax => "CLIMAX",
        }
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volume relative to its baseline at one candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeReading {
    pub timestamp: i64,
    pub volume: f64,
    pub baseline: f64,
    pub ratio: f64,
    pub level: VolumeLevel,
    pub strength: f64,
}

impl VolumeReading {
    pub fn from_ratio(timestamp: i64, volume: f64, baseline: f64) -> Self {
        let ratio = volume / baseline;
        let level = VolumeLevel::from_ratio(ratio);
        Self {
            timestamp,
            volume,
            baseline,
            ratio,
            level,
            strength: level.strength(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeParams {
    pub baseline_window: usize,
    pub min_samples: usize,
    pub readings: usize,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            baseline_window: 120,
            min_samples: 24,
            readings: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VolumeDetector {
    params: VolumeParams,
}

impl VolumeDetector {
    pub fn new(params: VolumeParams) -> Self {
        Self { params }
    }

    /// Readings for the last few candles, oldest first. Candles whose
    /// baseline is undefined or zero produce no reading.
    pub fn readings(&self, candles: &[Candle]) -> Vec<VolumeReading> {
        let n = candles.len();
        let min_samples = self.params.min_samples.max(1);
        if n < min_samples {
            return Vec::new();
        }
        let window = self.params.baseline_window.min(n).max(1);
        let start = n.saturating_sub(self.params.readings);

        (start..n)
            .filter_map(|i| {
                let from = (i + 1).saturating_sub(window);
                let samples = &candles[from..=i];
                if samples.len() < min_samples {
                    return None;
                }
                let baseline =
                    samples.iter().map(|c| c.volume).sum::<f64>() / samples.len() as f64;
                if baseline <= 0.0 || !baseline.is_finite() {
                    return None;
                }
                let candle = &candles[i];
                Some(VolumeReading::from_ratio(
                    candle.timestamp,
                    candle.volume,
                    baseline,
                ))
            })
            .collect()
    }
}
