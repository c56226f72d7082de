//! Historical replay.
//!
//! Slides the evaluation point across each entry's stored history and
//! applies the live loop's filters at every sampled candle: score
//! threshold, direction, and dedup against signals already produced for
//! the same entry. Entries are independent and run on the rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};

use confluence_core::domain::Candle;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::scanner::Evaluator;
use crate::signal::Signal;
use crate::source::CandleSource;
use crate::store::within_window;
use crate::watchlist::{WatchlistEntry, WatchlistError, WatchlistSource};

const SCORE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("watchlist unavailable: {0}")]
    Watchlist(#[from] WatchlistError),

    #[error("replay needs at least one candle of history (min_candles = 0)")]
    ZeroMinCandles,
}

/// Candles between sampled evaluation points for a timeframe.
pub fn sample_stride(timeframe: &str) -> usize {
    match timeframe {
        "15m" => 20,
        "1h" => 12,
        "12h" => 2,
        _ => 10,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySettings {
    /// Trailing window handed to the evaluator.
    pub candle_limit: usize,
    /// First evaluation once this many candles exist.
    pub min_candles: usize,
    pub min_score: f64,
    pub dedup_window_hours: f64,
    /// Candles fetched per entry.
    pub history_limit: usize,
}

impl ReplaySettings {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            candle_limit: config.scan.candle_limit,
            min_candles: config.engine.min_candles,
            min_score: config.scan.min_score,
            dedup_window_hours: config.scan.dedup_window_hours,
            history_limit: config.data.history_limit,
        }
    }
}

/// Per-entry result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReplay {
    pub entry: WatchlistEntry,
    pub candles: usize,
    pub evaluations: usize,
    pub signals: usize,
    /// Fetch failure, if the entry could not be replayed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub entries: Vec<EntryReplay>,
    /// All signals, sorted by (symbol, timeframe, timestamp).
    pub signals: Vec<Signal>,
    pub interrupted: bool,
}

/// Replay one entry over an in-memory history.
pub fn replay_series(
    evaluator: &dyn Evaluator,
    entry: &WatchlistEntry,
    candles: &[Candle],
    settings: &ReplaySettings,
    cancel: Option<&AtomicBool>,
) -> (Vec<Signal>, usize) {
    let stride = sample_stride(&entry.timeframe);
    let mut signals: Vec<Signal> = Vec::new();
    let mut evaluations = 0usize;

    let first = settings.min_candles.max(1) - 1;
    for end in (first..candles.len()).step_by(stride) {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            break;
        }
        let start = (end + 1).saturating_sub(settings.candle_limit);
        evaluations += 1;
        let Ok(analysis) = evaluator.evaluate(&candles[start..=end]) else {
            continue;
        };
        let result = &analysis.confluence;
        if result.score + SCORE_TOLERANCE < settings.min_score
            || result.primary_system != Some(entry.direction)
        {
            continue;
        }
        let duplicate = signals.iter().any(|s| {
            within_window(
                s,
                &entry.symbol,
                &entry.timeframe,
                analysis.timestamp,
                settings.dedup_window_hours,
            )
        });
        if duplicate {
            continue;
        }
        signals.push(Signal::from_analysis(entry, &analysis, analysis.timestamp));
    }
    (signals, evaluations)
}

/// Replay every entry of the watchlist in parallel.
pub fn replay(
    evaluator: &dyn Evaluator,
    source: &dyn CandleSource,
    watchlist: &dyn WatchlistSource,
    settings: &ReplaySettings,
    cancel: Option<&AtomicBool>,
) -> Result<ReplayReport, ReplayError> {
    if settings.min_candles == 0 {
        return Err(ReplayError::ZeroMinCandles);
    }
    let entries = watchlist.watchlist()?;
    info!(entries = entries.len(), "replay started");

    let results: Vec<(EntryReplay, Vec<Signal>)> = entries
        .par_iter()
        .map(|entry| {
            let candles =
                match source.fetch_candles(&entry.symbol, &entry.timeframe, settings.history_limit) {
                    Ok(candles) => candles,
                    Err(err) => {
                        warn!(entry = %entry, error = %err, "replay fetch failed");
                        let replay = EntryReplay {
                            entry: entry.clone(),
                            candles: 0,
                            evaluations: 0,
                            signals: 0,
                            error: Some(err.to_string()),
                        };
                        return (replay, Vec::new());
                    }
                };
            let (signals, evaluations) =
                replay_series(evaluator, entry, &candles, settings, cancel);
            debug!(entry = %entry, evaluations, signals = signals.len(), "entry replayed");
            let replay = EntryReplay {
                entry: entry.clone(),
                candles: candles.len(),
                evaluations,
                signals: signals.len(),
                error: None,
            };
            (replay, signals)
        })
        .collect();

    let mut report = ReplayReport {
        interrupted: cancel.is_some_and(|f| f.load(Ordering::Relaxed)),
        ..ReplayReport::default()
    };
    for (entry, signals) in results {
        report.entries.push(entry);
        report.signals.extend(signals);
    }
    report.signals.sort_by(|a, b| {
        (&a.symbol, &a.timeframe, a.timestamp).cmp(&(&b.symbol, &b.timeframe, b.timestamp))
    });
    info!(signals = report.signals.len(), "replay finished");
    Ok(report)
}
