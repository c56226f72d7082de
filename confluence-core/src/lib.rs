//! Confluence Core: indicators, event detectors and the confluence engine.
//!
//! This crate is pure and synchronous; it performs no I/O:
//! - Domain types (candles, directional system)
//! - Indicator Library (WMA, Hull, SMA, AO, Alligator, Ichimoku)
//! - Event Detectors, one per indicator family, plus the volume detector
//! - Confluence Aggregator (score, classification tier, primary system)
//! - `ConfluenceEngine`: window sanitising and detector orchestration

pub mod confluence;
pub mod detectors;
pub mod domain;
pub mod engine;
pub mod indicators;

pub use confluence::{aggregate, Classification, ConfluenceResult, FamilyEvents};
pub use detectors::{DetectorError, DetectorFamily, Event, EventDetector, EventKind};
pub use domain::{Candle, CandleError, System};
pub use engine::{Analysis, ConfluenceEngine, EngineError, EngineParams, Snapshot};
