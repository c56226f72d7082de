//! Candle: the fundamental market data unit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for one symbol on one timeframe.
///
/// `timestamp` is the candle open time in UTC seconds and is unique per
/// (symbol, timeframe). Candles are produced by a data collaborator and only
/// ever read by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a candle is rejected from the working window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("non-finite value in candle at {timestamp}")]
    NonFinite { timestamp: i64 },

    #[error("non-positive price in candle at {timestamp}")]
    NonPositivePrice { timestamp: i64 },

    #[error("negative volume {volume} in candle at {timestamp}")]
    NegativeVolume { timestamp: i64, volume: f64 },

    #[error("OHLC ordering violated at {timestamp}: low={low} open={open} close={close} high={high}")]
    OhlcOrdering {
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

impl Candle {
    /// Median price `(high + low) / 2`, the input series for AO and the Alligator.
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// True when the high/low range contains `level` (inclusive).
    pub fn touches(&self, level: f64) -> bool {
        self.low <= level && level <= self.high
    }

    /// Check the OHLCV invariants: finite values, positive prices,
    /// non-negative volume, `low <= open,close <= high`.
    pub fn validate(&self) -> Result<(), CandleError> {
        let ts = self.timestamp;
        let values = [self.open, self.high, self.low, self.close, self.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CandleError::NonFinite { timestamp: ts });
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleError::NonPositivePrice { timestamp: ts });
        }
        if self.volume < 0.0 {
            return Err(CandleError::NegativeVolume {
                timestamp: ts,
                volume: self.volume,
            });
        }
        let ordered = self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high;
        if !ordered {
            return Err(CandleError::OhlcOrdering {
                timestamp: ts,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Outcome of [`sanitize_window`].
#[derive(Debug, Clone, Default)]
pub struct SanitizedWindow {
    pub candles: Vec<Candle>,
    /// Candles that failed [`Candle::validate`].
    pub invalid: usize,
    /// Candles dropped because their timestamp did not advance.
    pub out_of_order: usize,
}

/// Build the working window: drop invalid candles and any candle whose
/// timestamp is not strictly greater than the last kept one.
pub fn sanitize_window(candles: &[Candle]) -> SanitizedWindow {
    let mut out = SanitizedWindow {
        candles: Vec::with_capacity(candles.len()),
        ..SanitizedWindow::default()
    };
    for candle in candles {
        if candle.validate().is_err() {
            out.invalid += 1;
            continue;
        }
        if let Some(last) = out.candles.last() {
            if candle.timestamp <= last.timestamp {
                out.out_of_order += 1;
                continue;
            }
        }
        out.candles.push(*candle);
    }
    out
}

/// Hours elapsed between `earlier` and `later` timestamps (seconds).
pub fn hours_between(earlier: i64, later: i64) -> f64 {
    (later - earlier) as f64 / 3600.0
}
