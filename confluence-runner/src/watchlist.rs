//! Watchlist: the (symbol, timeframe, direction) triples the scanner evaluates.
//!
//! The list is managed outside the scanner; [`FileWatchlist`] re-reads its
//! file on every call so edits take effect on the next cycle.

use std::path::{Path, PathBuf};

use confluence_core::domain::System;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("failed to read watchlist {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse watchlist {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One monitored market and the direction the trader wants alerts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub timeframe: String,
    pub direction: System,
}

impl WatchlistEntry {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, direction: System) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            direction,
        }
    }
}

impl std::fmt::Display for WatchlistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.symbol, self.timeframe, self.direction)
    }
}

/// Supplies the current watchlist at the start of each cycle.
pub trait WatchlistSource: Send + Sync {
    fn watchlist(&self) -> Result<Vec<WatchlistEntry>, WatchlistError>;
}

/// Fixed in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticWatchlist {
    entries: Vec<WatchlistEntry>,
}

impl StaticWatchlist {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        Self { entries }
    }
}

impl WatchlistSource for StaticWatchlist {
    fn watchlist(&self) -> Result<Vec<WatchlistEntry>, WatchlistError> {
        Ok(self.entries.clone())
    }
}

/// TOML file of `[[watchlist]]` tables.
///
/// ```toml
/// [[watchlist]]
/// symbol = "BTC/USDT"
/// timeframe = "1h"
/// direction = "bullish"
/// ```
#[derive(Debug, Clone)]
pub struct FileWatchlist {
    path: PathBuf,
}

#[derive(Deserialize)]
struct WatchlistFile {
    #[serde(default)]
    watchlist: Vec<WatchlistEntry>,
}

impl FileWatchlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatchlistSource for FileWatchlist {
    fn watchlist(&self) -> Result<Vec<WatchlistEntry>, WatchlistError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| WatchlistError::Read {
            path: self.path.clone(),
            source,
        })?;
        let file: WatchlistFile = toml::from_str(&content).map_err(|source| WatchlistError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.watchlist)
    }
}
