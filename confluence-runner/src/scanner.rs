//! Signal Detection Loop.
//!
//! One cycle walks the watchlist sequentially:
//!
//! ```text
//! IDLE → SCANNING → IDLE
//!          │
//!          └─ for each entry: fetch → evaluate → score filter → direction
//!             filter → dedup → persist → notify
//! ```
//!
//! A failing entry is logged and counted; it never aborts the cycle. The
//! stop flag is checked between entries, never mid-entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use confluence_core::domain::{Candle, System};
use confluence_core::engine::{Analysis, ConfluenceEngine, EngineError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ScanSettings, ScannerConfig};
use crate::notifier::{LogNotifier, Notifier};
use crate::scheduler::Ticker;
use crate::signal::Signal;
use crate::source::{CandleSource, SourceError};
use crate::store::{SignalStore, StoreError};
use crate::watchlist::{WatchlistEntry, WatchlistError, WatchlistSource};

/// Tolerance for floating summation drift at the score thresholds.
const SCORE_TOLERANCE: f64 = 1e-9;

/// Turns a candle window into a confluence analysis.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, candles: &[Candle]) -> Result<Analysis, EngineError>;
}

impl Evaluator for ConfluenceEngine {
    fn evaluate(&self, candles: &[Candle]) -> Result<Analysis, EngineError> {
        ConfluenceEngine::evaluate(self, candles)
    }
}

/// Cycle-level failure: nothing was scanned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("watchlist unavailable: {0}")]
    Watchlist(#[from] WatchlistError),
}

/// Failure while processing one watchlist entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("candle fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("dedup lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// What happened to one watchlist entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// The engine could not evaluate the window.
    InsufficientHistory(EngineError),
    BelowThreshold { score: f64 },
    DirectionMismatch {
        expected: System,
        actual: Option<System>,
    },
    /// A signal already exists inside the dedup window.
    Duplicate { timestamp: i64 },
    Accepted {
        signal: Signal,
        persisted: bool,
        notified: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning,
}

/// Counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub entries: usize,
    pub new_signals: usize,
    pub duplicates: usize,
    pub below_threshold: usize,
    pub direction_mismatches: usize,
    pub insufficient_history: usize,
    pub errors: usize,
    pub persist_failures: usize,
    pub notifications: usize,
    /// The stop flag ended the cycle before the last entry.
    pub interrupted: bool,
    /// Signals persisted this cycle.
    pub signals: Vec<Signal>,
}

impl ScanReport {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::InsufficientHistory(_) => self.insufficient_history += 1,
            EntryOutcome::BelowThreshold { .. } => self.below_threshold += 1,
            EntryOutcome::DirectionMismatch { .. } => self.direction_mismatches += 1,
            EntryOutcome::Duplicate { .. } => self.duplicates += 1,
            EntryOutcome::Accepted {
                signal,
                persisted,
                notified,
            } => {
                if persisted {
                    self.new_signals += 1;
                    self.signals.push(signal);
                } else {
                    self.persist_failures += 1;
                }
                if notified {
                    self.notifications += 1;
                }
            }
        }
    }
}

/// Totals across [`Scanner::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub new_signals: usize,
    pub notifications: usize,
    pub entry_errors: usize,
    pub interrupted: bool,
}

pub struct Scanner {
    settings: ScanSettings,
    evaluator: Arc<dyn Evaluator>,
    source: Arc<dyn CandleSource>,
    store: Arc<dyn SignalStore>,
    watchlist: Arc<dyn WatchlistSource>,
    notifier: Option<Arc<dyn Notifier>>,
    phase: ScanPhase,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("settings", &self.settings)
            .field("phase", &self.phase)
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

fn stopped(stop: Option<&AtomicBool>) -> bool {
    stop.is_some_and(|f| f.load(Ordering::Relaxed))
}

impl Scanner {
    pub fn new(
        settings: ScanSettings,
        evaluator: Arc<dyn Evaluator>,
        source: Arc<dyn CandleSource>,
        store: Arc<dyn SignalStore>,
        watchlist: Arc<dyn WatchlistSource>,
    ) -> Self {
        Self {
            settings,
            evaluator,
            source,
            store,
            watchlist,
            notifier: None,
            phase: ScanPhase::Idle,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Production wiring: the confluence engine, the configured candle
    /// source, the JSONL signal store and the log notifier.
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config.scan.clone(),
            Arc::new(ConfluenceEngine::new(config.engine.clone())),
            config.candle_source(),
            config.signal_store(),
            config.watchlist_source(),
        )
        .with_notifier(Arc::new(LogNotifier))
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn SignalStore> {
        &self.store
    }

    /// Run one scan cycle over the current watchlist.
    pub fn scan_once(&mut self, stop: Option<&AtomicBool>) -> Result<ScanReport, ScanError> {
        let entries = self.watchlist.watchlist()?;
        self.phase = ScanPhase::Scanning;
        debug!(entries = entries.len(), "scan cycle started");

        let mut report = ScanReport::default();
        for entry in &entries {
            if stopped(stop) {
                report.interrupted = true;
                break;
            }
            report.entries += 1;
            match self.process_entry(entry) {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    warn!(entry = %entry, error = %err, "entry failed");
                    report.errors += 1;
                }
            }
        }

        self.phase = ScanPhase::Idle;
        info!(
            entries = report.entries,
            new_signals = report.new_signals,
            duplicates = report.duplicates,
            errors = report.errors,
            interrupted = report.interrupted,
            "scan cycle finished"
        );
        Ok(report)
    }

    /// Evaluate one entry and, if it qualifies, persist and notify.
    pub fn process_entry(&self, entry: &WatchlistEntry) -> Result<EntryOutcome, EntryError> {
        let candles = self.source.fetch_candles(
            &entry.symbol,
            &entry.timeframe,
            self.settings.candle_limit,
        )?;
        let analysis = match self.evaluator.evaluate(&candles) {
            Ok(analysis) => analysis,
            Err(err) => {
                debug!(entry = %entry, error = %err, "skipped: not enough history");
                return Ok(EntryOutcome::InsufficientHistory(err));
            }
        };

        let score = analysis.confluence.score;
        if score + SCORE_TOLERANCE < self.settings.min_score {
            debug!(entry = %entry, score, "skipped: below threshold");
            return Ok(EntryOutcome::BelowThreshold { score });
        }
        let actual = analysis.confluence.primary_system;
        if actual != Some(entry.direction) {
            debug!(entry = %entry, ?actual, "skipped: direction mismatch");
            return Ok(EntryOutcome::DirectionMismatch {
                expected: entry.direction,
                actual,
            });
        }
        if self.store.signal_exists_in_window(
            &entry.symbol,
            &entry.timeframe,
            analysis.timestamp,
            self.settings.dedup_window_hours,
        )? {
            debug!(entry = %entry, timestamp = analysis.timestamp, "skipped: duplicate");
            return Ok(EntryOutcome::Duplicate {
                timestamp: analysis.timestamp,
            });
        }

        let mut signal = Signal::from_analysis(entry, &analysis, chrono::Utc::now().timestamp());
        if let Err(err) = self.store.persist_signal(&signal) {
            warn!(entry = %entry, error = %err, "failed to persist signal; not notifying");
            return Ok(EntryOutcome::Accepted {
                signal,
                persisted: false,
                notified: false,
            });
        }
        info!(
            symbol = %signal.symbol,
            timeframe = %signal.timeframe,
            direction = %signal.direction,
            score = signal.score,
            classification = %signal.classification,
            "new signal"
        );

        let notified = self.notify(&signal);
        signal.notified = notified;
        Ok(EntryOutcome::Accepted {
            signal,
            persisted: true,
            notified,
        })
    }

    fn notify(&self, signal: &Signal) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };
        if signal.score + SCORE_TOLERANCE < self.settings.notify_min_score {
            return false;
        }
        if let Err(err) = notifier.notify(signal) {
            warn!(id = %signal.id, error = %err, "notification failed");
            return false;
        }
        if let Err(err) = self.store.mark_notified(&signal.id) {
            warn!(id = %signal.id, error = %err, "failed to mark signal notified");
        }
        true
    }

    /// Repeat cycles until the ticker ends or `stop` is raised. A failed
    /// cycle is logged and the loop waits for the next tick.
    pub fn run(&mut self, ticker: &mut dyn Ticker, stop: Option<&AtomicBool>) -> RunSummary {
        let mut summary = RunSummary::default();
        while ticker.wait_next(stop) {
            summary.cycles += 1;
            match self.scan_once(stop) {
                Ok(report) => {
                    summary.new_signals += report.new_signals;
                    summary.notifications += report.notifications;
                    summary.entry_errors += report.errors;
                    if report.interrupted {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "scan cycle failed");
                    summary.failed_cycles += 1;
                }
            }
        }
        summary.interrupted = stopped(stop);
        info!(
            cycles = summary.cycles,
            new_signals = summary.new_signals,
            interrupted = summary.interrupted,
            "scan loop stopped"
        );
        summary
    }
}
