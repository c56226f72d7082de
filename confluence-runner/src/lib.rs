//! Confluence Runner: the signal detection loop and its collaborators.
//!
//! This crate builds on `confluence-core` to provide:
//! - `Scanner`: periodic watchlist scan with score/direction filters, dedup,
//!   persistence and notification
//! - Candle sources (CSV, in-memory, deterministic synthetic)
//! - Signal stores (in-memory, append-only JSONL)
//! - TOML configuration and watchlists
//! - Tickers for interval and bounded loops
//! - Historical replay across stored history

pub mod config;
pub mod notifier;
pub mod replay;
pub mod scanner;
pub mod scheduler;
pub mod signal;
pub mod source;
pub mod store;
pub mod watchlist;

pub use config::{ConfigError, DataSettings, ScanSettings, ScannerConfig, StoreSettings};
pub use notifier::{format_alert, LogNotifier, Notifier, NotifyError};
pub use replay::{replay, sample_stride, EntryReplay, ReplayError, ReplayReport, ReplaySettings};
pub use scanner::{
    EntryError, EntryOutcome, Evaluator, RunSummary, ScanError, ScanPhase, ScanReport, Scanner,
};
pub use scheduler::{CycleLimit, IntervalTicker, Ticker};
pub use signal::{signal_id, IndicatorBreakdown, Signal};
pub use source::{
    CandleSource, CsvCandleSource, MemoryCandleSource, SourceError, SyntheticCandleSource,
};
pub use store::{JsonlSignalStore, MemorySignalStore, SignalStore, StoreError};
pub use watchlist::{
    FileWatchlist, StaticWatchlist, WatchlistEntry, WatchlistError, WatchlistSource,
};
