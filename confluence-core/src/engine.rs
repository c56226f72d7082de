//! Confluence engine: window sanitising, indicator precompute, detector
//! orchestration and aggregation.
//!
//! `evaluate` is pure with respect to its input: the same candle window
//! always yields the same [`Analysis`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::confluence::{aggregate, ConfluenceResult, FamilyEvents};
use crate::detectors::{
    AlligatorDetector, AlligatorParams, AlligatorState, AlligatorTransition, AoDivergenceDetector,
    CloudColor, CloudColorChange, DetectorError, DivergenceParams, EventDetector, HullDetector,
    HullParams, IchimokuDetector, IchimokuEventParams, VolumeDetector, VolumeParams,
    VolumeReading,
};
use crate::domain::{sanitize_window, Candle};
use crate::indicators::{AlligatorPoint, IchimokuPoint, IndicatorParams, IndicatorSet};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no valid candles in window ({dropped} dropped)")]
    EmptyWindow { dropped: usize },

    #[error("insufficient history: {available} valid candles, {required} required")]
    InsufficientHistory { required: usize, available: usize },
}

/// Every tunable of the engine. All sections default to the standard
/// settings, so a partial TOML `[engine]` table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Minimum valid candles required before evaluation.
    pub min_candles: usize,
    pub indicators: IndicatorParams,
    pub hull: HullParams,
    pub divergence: DivergenceParams,
    pub alligator: AlligatorParams,
    pub ichimoku: IchimokuEventParams,
    pub volume: VolumeParams,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            min_candles: 150,
            indicators: IndicatorParams::default(),
            hull: HullParams::default(),
            divergence: DivergenceParams::default(),
            alligator: AlligatorParams::default(),
            ichimoku: IchimokuEventParams::default(),
            volume: VolumeParams::default(),
        }
    }
}

/// Latest indicator values and context, for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub hull_fast: Option<f64>,
    pub hull_slow: Option<f64>,
    pub ao: Option<f64>,
    pub alligator: Option<AlligatorPoint>,
    pub alligator_state: Option<AlligatorState>,
    pub alligator_transition: Option<AlligatorTransition>,
    pub ichimoku: Option<IchimokuPoint>,
    pub cloud_color: Option<CloudColor>,
    pub color_changes: Vec<CloudColorChange>,
}

/// Result of evaluating one candle window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Timestamp of the latest valid candle.
    pub timestamp: i64,
    /// Close of the latest valid candle.
    pub price: f64,
    /// Candles in the working window after sanitising.
    pub candles_used: usize,
    pub candles_dropped: usize,
    pub events: FamilyEvents,
    /// Readings for the last few candles, oldest first.
    pub volume: Vec<VolumeReading>,
    pub confluence: ConfluenceResult,
    pub snapshot: Snapshot,
}

impl Analysis {
    pub fn latest_volume(&self) -> Option<&VolumeReading> {
        self.volume.last()
    }
}

pub struct ConfluenceEngine {
    params: EngineParams,
    detectors: Vec<Box<dyn EventDetector>>,
    alligator: AlligatorDetector,
    ichimoku: IchimokuDetector,
    volume: VolumeDetector,
}

impl std::fmt::Debug for ConfluenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let families: Vec<_> = self.detectors.iter().map(|d| d.family()).collect();
        f.debug_struct("ConfluenceEngine")
            .field("params", &self.params)
            .field("detectors", &families)
            .finish()
    }
}

impl Default for ConfluenceEngine {
    fn default() -> Self {
        Self::new(EngineParams::default())
    }
}

impl ConfluenceEngine {
    /// Engine with the four standard detector families.
    pub fn new(params: EngineParams) -> Self {
        let detectors: Vec<Box<dyn EventDetector>> = vec![
            Box::new(HullDetector::new(params.hull.clone())),
            Box::new(AoDivergenceDetector::new(params.divergence.clone())),
            Box::new(AlligatorDetector::new(params.alligator.clone())),
            Box::new(IchimokuDetector::new(params.ichimoku.clone())),
        ];
        Self::with_detectors(params, detectors)
    }

    /// Engine with a custom detector list. Events are still grouped and
    /// aggregated by family in evaluation order.
    pub fn with_detectors(params: EngineParams, detectors: Vec<Box<dyn EventDetector>>) -> Self {
        Self {
            alligator: AlligatorDetector::new(params.alligator.clone()),
            ichimoku: IchimokuDetector::new(params.ichimoku.clone()),
            volume: VolumeDetector::new(params.volume.clone()),
            params,
            detectors,
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Evaluate the trailing candle window.
    ///
    /// Invalid candles and non-ascending timestamps are dropped first. A
    /// detector failure is logged and counts as zero events for its family.
    pub fn evaluate(&self, candles: &[Candle]) -> Result<Analysis, EngineError> {
        let window = sanitize_window(candles);
        let dropped = window.invalid + window.out_of_order;
        if dropped > 0 {
            debug!(
                invalid = window.invalid,
                out_of_order = window.out_of_order,
                "dropped candles from window"
            );
        }
        let candles = window.candles;
        let Some(last) = candles.last().copied() else {
            return Err(EngineError::EmptyWindow { dropped });
        };
        if candles.len() < self.params.min_candles {
            return Err(EngineError::InsufficientHistory {
                required: self.params.min_candles,
                available: candles.len(),
            });
        }

        let indicators = IndicatorSet::compute(&candles, &self.params.indicators);

        let mut events = FamilyEvents::default();
        for detector in &self.detectors {
            let family = detector.family();
            let warmup = detector.warmup_candles();
            if candles.len() < warmup {
                debug!(%family, warmup, available = candles.len(), "detector still warming up");
                continue;
            }
            match detector.detect(&candles, &indicators) {
                Ok(found) => events.get_mut(family).extend(found),
                Err(err) => warn!(%family, error = %err, "detector failed; family contributes no events"),
            }
        }

        let volume = self.volume.readings(&candles);
        let confluence = aggregate(&events, volume.last());
        let snapshot = self.snapshot(&candles, &indicators);

        Ok(Analysis {
            timestamp: last.timestamp,
            price: last.close,
            candles_used: candles.len(),
            candles_dropped: dropped,
            events,
            volume,
            confluence,
            snapshot,
        })
    }

    fn snapshot(&self, candles: &[Candle], indicators: &IndicatorSet) -> Snapshot {
        let latest = |series: &[f64]| series.last().copied().filter(|v| !v.is_nan());
        let alligator = context(self.alligator.analyze(candles, indicators));
        let ichimoku = context(self.ichimoku.analyze(candles, indicators));

        Snapshot {
            hull_fast: latest(&indicators.hull_fast),
            hull_slow: latest(&indicators.hull_slow),
            ao: latest(&indicators.ao),
            alligator: indicators.alligator.as_ref().and_then(|l| l.latest()),
            alligator_state: alligator.as_ref().map(|r| r.state),
            alligator_transition: alligator.and_then(|r| r.transition),
            ichimoku: indicators.ichimoku.as_ref().and_then(|l| l.latest()),
            cloud_color: ichimoku.as_ref().and_then(|r| r.current_color),
            color_changes: ichimoku.map(|r| r.color_changes).unwrap_or_default(),
        }
    }
}

fn context<T>(result: Result<Option<T>, DetectorError>) -> Option<T> {
    match result {
        Ok(report) => report,
        Err(err) => {
            debug!(error = %err, "context unavailable");
            None
        }
    }
}
