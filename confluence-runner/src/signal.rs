//! Persisted signal record.

use confluence_core::confluence::Classification;
use confluence_core::detectors::{DetectorFamily, VolumeLevel};
use confluence_core::domain::System;
use confluence_core::engine::Analysis;
use serde::{Deserialize, Serialize};

use crate::watchlist::WatchlistEntry;

/// Number of confluence factors kept in [`Signal::details`].
const DETAIL_FACTORS: usize = 3;

/// Scored events per family behind a signal. `volume` is 1 when the latest
/// volume level is above NORMAL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorBreakdown {
    pub hull: usize,
    pub ao: usize,
    pub alligator: usize,
    pub ichimoku: usize,
    pub volume: usize,
}

impl IndicatorBreakdown {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let count = |family| analysis.events.scored_count(family);
        let volume = analysis
            .latest_volume()
            .is_some_and(|r| r.level != VolumeLevel::Normal);
        Self {
            hull: count(DetectorFamily::Hull),
            ao: count(DetectorFamily::AwesomeOscillator),
            alligator: count(DetectorFamily::Alligator),
            ichimoku: count(DetectorFamily::Ichimoku),
            volume: usize::from(volume),
        }
    }
}

impl std::fmt::Display for IndicatorBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hull={} ao={} alligator={} ichimoku={} volume={}",
            self.hull, self.ao, self.alligator, self.ichimoku, self.volume
        )
    }
}

/// An accepted confluence evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// BLAKE3 hex of `symbol|timeframe|timestamp`.
    pub id: String,
    pub symbol: String,
    pub timeframe: String,
    /// Timestamp of the evaluated candle.
    pub timestamp: i64,
    pub direction: System,
    pub score: f64,
    pub classification: Classification,
    pub price: f64,
    pub indicator_breakdown: IndicatorBreakdown,
    pub volume_level: VolumeLevel,
    pub volume_ratio: f64,
    /// Top confluence factors joined with `"; "`.
    pub details: String,
    /// Wall-clock seconds when the signal was built.
    pub created_at: i64,
    pub notified: bool,
}

pub fn signal_id(symbol: &str, timeframe: &str, timestamp: i64) -> String {
    blake3::hash(format!("{symbol}|{timeframe}|{timestamp}").as_bytes())
        .to_hex()
        .to_string()
}

impl Signal {
    /// Build from an analysis that already passed the direction filter, so
    /// the entry's direction is the analysis' primary system.
    pub fn from_analysis(entry: &WatchlistEntry, analysis: &Analysis, created_at: i64) -> Self {
        let confluence = &analysis.confluence;
        let (volume_level, volume_ratio) = analysis
            .latest_volume()
            .map_or((VolumeLevel::Normal, 1.0), |r| (r.level, r.ratio));
        let details = confluence
            .factors
            .iter()
            .take(DETAIL_FACTORS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            id: signal_id(&entry.symbol, &entry.timeframe, analysis.timestamp),
            symbol: entry.symbol.clone(),
            timeframe: entry.timeframe.clone(),
            timestamp: analysis.timestamp,
            direction: entry.direction,
            score: confluence.score,
            classification: confluence.classification,
            price: analysis.price,
            indicator_breakdown: IndicatorBreakdown::from_analysis(analysis),
            volume_level,
            volume_ratio,
            details,
            created_at,
            notified: false,
        }
    }

    pub fn time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn signal(symbol: &str, timeframe: &str, timestamp: i64, score: f64) -> Signal {
        Signal {
            id: signal_id(symbol, timeframe, timestamp),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            timestamp,
            direction: System::Bullish,
            score,
            classification: Classification::from_score(score),
            price: 100.0,
            indicator_breakdown: IndicatorBreakdown::default(),
            volume_level: VolumeLevel::Normal,
            volume_ratio: 1.0,
            details: "First close above Hull 21".to_string(),
            created_at: timestamp,
            notified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::domain::Candle;
    use confluence_core::engine::ConfluenceEngine;

    fn breakout() -> Vec<Candle> {
        (0..200)
            .map(|i| {
                let close = match i {
                    198 => 95.0,
                    199 => 110.0,
                    _ => 100.0,
                };
                let open = match i {
                    199 => 95.0,
                    _ => 100.0,
                };
                Candle {
                    timestamp: 1_704_067_200 + i * 3600,
                    open,
                    high: f64::max(open, close) + 1.0,
                    low: f64::min(open, close) - 1.0,
                    close,
                    volume: if i == 199 { 2500.0 } else { 1000.0 },
                }
            })
            .collect()
    }

    #[test]
    fn id_is_stable_blake3_hex() {
        let a = signal_id("BTC/USDT", "1h", 1_704_067_200);
        assert_eq!(a, signal_id("BTC/USDT", "1h", 1_704_067_200));
        assert_ne!(a, signal_id("BTC/USDT", "4h", 1_704_067_200));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn builds_from_engine_analysis() {
        let analysis = ConfluenceEngine::default().evaluate(&breakout()).unwrap();
        let entry = WatchlistEntry::new("BTC/USDT", "1h", System::Bullish);
        let signal = Signal::from_analysis(&entry, &analysis, 42);

        assert_eq!(signal.timestamp, 1_704_067_200 + 199 * 3600);
        assert_eq!(signal.price, 110.0);
        assert_eq!(signal.score, analysis.confluence.score);
        assert_eq!(signal.volume_level, VolumeLevel::Hot);
        assert_eq!(signal.indicator_breakdown.hull, 1);
        assert_eq!(signal.indicator_breakdown.volume, 1);
        assert!(signal.details.starts_with("First close above Hull 21"));
        assert!(signal.details.split("; ").count() <= 3);
        assert_eq!(signal.created_at, 42);
        assert!(!signal.notified);
    }

    #[test]
    fn serializes_classification_label() {
        let signal = fixtures::signal("BTC", "1h", 0, 1.8);
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"classification\":\"VERY GOOD\""));
        assert!(json.contains("\"direction\":\"bullish\""));
        assert!(json.contains("\"volume_level\":\"NORMAL\""));
    }
}
