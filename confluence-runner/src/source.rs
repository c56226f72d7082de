//! Candle sources.
//!
//! - [`CsvCandleSource`]: one CSV file per (symbol, timeframe)
//! - [`MemoryCandleSource`]: in-memory series, for tests and embedding
//! - [`SyntheticCandleSource`]: deterministic random walk for offline demos
//!
//! Every source returns candles in ascending time order, at most `limit` of
//! them, newest last. A short series is not an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use confluence_core::domain::Candle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no candle data for {symbol} {timeframe}")]
    NotFound { symbol: String, timeframe: String },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),
}

/// Fetches the most recent candles for a market.
pub trait CandleSource: Send + Sync {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;
}

/// Seconds per candle for labels like `15m`, `1h`, `12h`, `1d`, `1w`.
pub fn timeframe_seconds(timeframe: &str) -> Option<i64> {
    let tf = timeframe.trim();
    let split = tf.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = tf.split_at(split);
    let count: i64 = count.parse().ok().filter(|&n| n > 0)?;
    let unit_secs = match unit {
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return None,
    };
    Some(count * unit_secs)
}

fn tail(mut candles: Vec<Candle>, limit: usize) -> Vec<Candle> {
    if candles.len() > limit {
        candles.drain(..candles.len() - limit);
    }
    candles
}

// ─── CSV ─────────────────────────────────────────────────────────────

/// Reads `<dir>/<symbol>_<timeframe>.csv` with header
/// `timestamp,open,high,low,close,volume` (Unix seconds). `/` in the symbol
/// becomes `-` in the file name.
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{timeframe}.csv", symbol.replace('/', "-")))
    }
}

/// Read every candle in a CSV file, sorted ascending by timestamp.
pub fn read_csv(path: &Path) -> Result<Vec<Candle>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut candles = reader
        .deserialize::<Candle>()
        .collect::<Result<Vec<_>, _>>()?;
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Write candles with the header [`read_csv`] expects.
pub fn write_csv(path: &Path, candles: &[Candle]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;
    Ok(())
}

impl CandleSource for CsvCandleSource {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(SourceError::NotFound {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let candles = read_csv(&path).map_err(|source| SourceError::Csv {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), rows = candles.len(), "loaded candles");
        Ok(tail(candles, limit))
    }
}

// ─── In-memory ───────────────────────────────────────────────────────

/// Series keyed by (symbol, timeframe). Series can be replaced while a
/// scanner holds the source.
#[derive(Debug, Default)]
pub struct MemoryCandleSource {
    series: RwLock<HashMap<(String, String), Vec<Candle>>>,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, symbol: &str, timeframe: &str, candles: Vec<Candle>) {
        self.series
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((symbol.to_string(), timeframe.to_string()), candles);
    }
}

impl CandleSource for MemoryCandleSource {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        let candles = series
            .get(&(symbol.to_string(), timeframe.to_string()))
            .ok_or_else(|| SourceError::NotFound {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })?;
        Ok(tail(candles.clone(), limit))
    }
}

// ─── Synthetic ───────────────────────────────────────────────────────

/// Deterministic random walk from 100.0, seeded by BLAKE3 of
/// `symbol|timeframe`. The series ends at `end` (aligned down to the
/// timeframe) and holds `history` candles; values do not depend on `end`.
#[derive(Debug, Clone)]
pub struct SyntheticCandleSource {
    history: usize,
    end: i64,
}

impl SyntheticCandleSource {
    /// Series ending at the current wall-clock time.
    pub fn new(history: usize) -> Self {
        Self::ending_at(history, chrono::Utc::now().timestamp())
    }

    pub fn ending_at(history: usize, end: i64) -> Self {
        Self { history, end }
    }

    pub fn generate(&self, symbol: &str, timeframe: &str) -> Result<Vec<Candle>, SourceError> {
        let step = timeframe_seconds(timeframe)
            .ok_or_else(|| SourceError::UnknownTimeframe(timeframe.to_string()))?;

        let seed_bytes = blake3::hash(format!("{symbol}|{timeframe}").as_bytes());
        let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

        let last = self.end - self.end.rem_euclid(step);
        let first = last - (self.history.saturating_sub(1) as i64) * step;

        let mut candles = Vec::with_capacity(self.history);
        let mut price = 100.0_f64;
        for i in 0..self.history {
            let ret: f64 = rng.gen_range(-0.015..0.015);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            let spike = if rng.gen_bool(0.05) { rng.gen_range(1.5..3.5) } else { 1.0 };
            let volume = rng.gen_range(800.0..1_200.0) * spike;
            candles.push(Candle {
                timestamp: first + i as i64 * step,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
        }
        Ok(candles)
    }
}

impl CandleSource for SyntheticCandleSource {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        Ok(tail(self.generate(symbol, timeframe)?, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: i64 = 1_704_067_200;

    fn flat(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                timestamp: EPOCH + i as i64 * 3600,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn parses_timeframes() {
        assert_eq!(timeframe_seconds("15m"), Some(900));
        assert_eq!(timeframe_seconds("1h"), Some(3600));
        assert_eq!(timeframe_seconds("12h"), Some(43_200));
        assert_eq!(timeframe_seconds("1d"), Some(86_400));
        assert_eq!(timeframe_seconds("h"), None);
        assert_eq!(timeframe_seconds("0h"), None);
        assert_eq!(timeframe_seconds("3y"), None);
    }

    #[test]
    fn csv_path_replaces_slash() {
        let source = CsvCandleSource::new("/data");
        assert_eq!(
            source.path_for("BTC/USDT", "1h"),
            PathBuf::from("/data/BTC-USDT_1h.csv")
        );
    }

    #[test]
    fn csv_round_trip_sorts_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvCandleSource::new(dir.path());
        let mut candles = flat(10);
        candles.reverse();
        write_csv(&source.path_for("BTC/USDT", "1h"), &candles).unwrap();

        let got = source.fetch_candles("BTC/USDT", "1h", 4).unwrap();
        assert_eq!(got.len(), 4);
        assert_eq!(got[0].timestamp, EPOCH + 6 * 3600);
        assert_eq!(got[3].close, 109.0);
    }

    #[test]
    fn csv_reads_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ETH_15m.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n1704067200, 10, 11, 9, 10.5, 300\n",
        )
        .unwrap();
        let got = CsvCandleSource::new(dir.path())
            .fetch_candles("ETH", "15m", 200)
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].close, 10.5);
    }

    #[test]
    fn csv_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvCandleSource::new(dir.path())
            .fetch_candles("BTC", "1h", 10)
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn csv_bad_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BTC_1h.csv");
        std::fs::write(&path, "timestamp,open,high,low,close,volume\nx,1,1,1,1,1\n").unwrap();
        let err = CsvCandleSource::new(dir.path())
            .fetch_candles("BTC", "1h", 10)
            .unwrap_err();
        assert!(matches!(err, SourceError::Csv { .. }));
    }

    #[test]
    fn memory_source_replaces_series() {
        let source = MemoryCandleSource::new();
        source.insert("BTC", "1h", flat(5));
        assert_eq!(source.fetch_candles("BTC", "1h", 10).unwrap().len(), 5);
        source.insert("BTC", "1h", flat(8));
        assert_eq!(source.fetch_candles("BTC", "1h", 3).unwrap().len(), 3);
        assert!(source.fetch_candles("BTC", "4h", 3).is_err());
    }

    #[test]
    fn synthetic_is_deterministic_and_valid() {
        let source = SyntheticCandleSource::ending_at(300, EPOCH + 1_000);
        let a = source.fetch_candles("BTC/USDT", "1h", 200).unwrap();
        let b = source.fetch_candles("BTC/USDT", "1h", 200).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_eq!(a.last().unwrap().timestamp, EPOCH);
        assert!(a.windows(2).all(|w| w[1].timestamp - w[0].timestamp == 3600));
        assert!(a.iter().all(Candle::is_valid));

        let other = source.fetch_candles("ETH/USDT", "1h", 200).unwrap();
        assert_ne!(a[0].close, other[0].close);
    }

    #[test]
    fn synthetic_values_do_not_depend_on_end() {
        let early = SyntheticCandleSource::ending_at(50, EPOCH).generate("BTC", "1h").unwrap();
        let late = SyntheticCandleSource::ending_at(50, EPOCH + 7200).generate("BTC", "1h").unwrap();
        assert_eq!(early[10].close, late[10].close);
        assert_eq!(late[0].timestamp - early[0].timestamp, 7200);
    }

    #[test]
    fn synthetic_rejects_unknown_timeframe() {
        let source = SyntheticCandleSource::ending_at(10, EPOCH);
        assert!(matches!(
            source.fetch_candles("BTC", "weekly", 10),
            Err(SourceError::UnknownTimeframe(_))
        ));
    }
}
