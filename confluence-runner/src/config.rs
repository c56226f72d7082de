//! Scanner configuration, loaded from TOML.
//!
//! Every section is optional; a file containing only a `[[watchlist]]`
//! table is a complete configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use confluence_core::engine::EngineParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{CandleSource, CsvCandleSource, SyntheticCandleSource};
use crate::store::{JsonlSignalStore, SignalStore};
use crate::watchlist::{FileWatchlist, StaticWatchlist, WatchlistEntry, WatchlistSource};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Scan-cycle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// Minimum score for a signal to be kept.
    pub min_score: f64,
    /// Minimum score for a kept signal to be pushed to the notifier.
    pub notify_min_score: f64,
    /// Signals for the same symbol/timeframe within this many hours of an
    /// existing one are duplicates.
    pub dedup_window_hours: f64,
    /// Candles requested per evaluation.
    pub candle_limit: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            min_score: 1.2,
            notify_min_score: 2.5,
            dedup_window_hours: 4.0,
            candle_limit: 200,
        }
    }
}

/// Where candles come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory of `<symbol>_<timeframe>.csv` files.
    pub candles_dir: Option<PathBuf>,
    /// Generate deterministic synthetic candles instead of reading files.
    pub synthetic: bool,
    /// Length of each synthetic series.
    pub synthetic_history: usize,
    /// Candles loaded per entry by historical replay.
    pub history_limit: usize,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            candles_dir: None,
            synthetic: false,
            synthetic_history: 1_000,
            history_limit: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub signals_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            signals_path: PathBuf::from("signals.jsonl"),
        }
    }
}

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub scan: ScanSettings,
    pub data: DataSettings,
    pub store: StoreSettings,
    pub engine: EngineParams,
    /// Inline watchlist.
    pub watchlist: Vec<WatchlistEntry>,
    /// External watchlist file, re-read at the start of every cycle. Takes
    /// precedence over the inline list.
    pub watchlist_path: Option<PathBuf>,
}

impl ScannerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scan = &self.scan;
        if scan.interval_secs == 0 {
            return Err(invalid("scan.interval_secs", "must be positive"));
        }
        for (field, value) in [
            ("scan.min_score", scan.min_score),
            ("scan.notify_min_score", scan.notify_min_score),
            ("scan.dedup_window_hours", scan.dedup_window_hours),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("must be a non-negative number, got {value}")));
            }
        }
        if scan.candle_limit < self.engine.min_candles {
            return Err(invalid(
                "scan.candle_limit",
                format!(
                    "({}) is below engine.min_candles ({})",
                    scan.candle_limit, self.engine.min_candles
                ),
            ));
        }

        let ind = &self.engine.indicators;
        for (field, period) in [
            ("engine.indicators.hull_fast", ind.hull_fast),
            ("engine.indicators.hull_slow", ind.hull_slow),
            ("engine.indicators.ao_fast", ind.ao_fast),
            ("engine.indicators.ao_slow", ind.ao_slow),
            ("engine.indicators.alligator_multiplier", ind.alligator_multiplier),
            ("engine.indicators.ichimoku.conversion", ind.ichimoku.conversion),
            ("engine.indicators.ichimoku.base", ind.ichimoku.base),
            ("engine.indicators.ichimoku.lead_b", ind.ichimoku.lead_b),
            ("engine.divergence.pivot_order", self.engine.divergence.pivot_order),
            ("engine.volume.baseline_window", self.engine.volume.baseline_window),
        ] {
            if period == 0 {
                return Err(invalid(field, "must be positive"));
            }
        }
        if ind.ao_fast >= ind.ao_slow {
            return Err(invalid(
                "engine.indicators.ao_fast",
                format!("({}) must be below ao_slow ({})", ind.ao_fast, ind.ao_slow),
            ));
        }
        let lookback = ind.max_lookback();
        if self.engine.min_candles <= lookback {
            return Err(invalid(
                "engine.min_candles",
                format!(
                    "({}) must exceed the longest indicator warmup ({lookback})",
                    self.engine.min_candles
                ),
            ));
        }
        if self.data.candles_dir.is_none() && !self.data.synthetic {
            return Err(invalid("data", "needs candles_dir or synthetic = true"));
        }
        if self.data.synthetic && self.data.synthetic_history < scan.candle_limit {
            return Err(invalid(
                "data.synthetic_history",
                format!("must be at least scan.candle_limit ({})", scan.candle_limit),
            ));
        }
        Ok(())
    }

    /// Synthetic data wins over `candles_dir` when both are set.
    pub fn candle_source(&self) -> Arc<dyn CandleSource> {
        match (&self.data.candles_dir, self.data.synthetic) {
            (Some(dir), false) => Arc::new(CsvCandleSource::new(dir)),
            _ => Arc::new(SyntheticCandleSource::new(self.data.synthetic_history)),
        }
    }

    pub fn signal_store(&self) -> Arc<dyn SignalStore> {
        Arc::new(JsonlSignalStore::new(&self.store.signals_path))
    }

    /// The external watchlist file when configured, else the inline list.
    pub fn watchlist_source(&self) -> Arc<dyn WatchlistSource> {
        match &self.watchlist_path {
            Some(path) => Arc::new(FileWatchlist::new(path)),
            None => Arc::new(StaticWatchlist::new(self.watchlist.clone())),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
