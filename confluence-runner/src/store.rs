//! Signal stores.
//!
//! The scanner only needs three capabilities from storage: the dedup lookup,
//! persisting an accepted signal, and flagging it notified. Writes are
//! serialized inside each store.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::signal::Signal;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signal store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode signal record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unknown signal id {0}")]
    UnknownSignal(String),
}

pub trait SignalStore: Send + Sync {
    /// True when a signal for the same symbol and timeframe has a timestamp
    /// within `window_hours` of `center` (inclusive on both sides).
    fn signal_exists_in_window(
        &self,
        symbol: &str,
        timeframe: &str,
        center: i64,
        window_hours: f64,
    ) -> Result<bool, StoreError>;

    fn persist_signal(&self, signal: &Signal) -> Result<(), StoreError>;

    fn mark_notified(&self, id: &str) -> Result<(), StoreError>;

    /// Up to `limit` signals, most recently persisted first.
    fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError>;
}

/// Inclusive dedup window check shared by every store.
pub fn within_window(signal: &Signal, symbol: &str, timeframe: &str, center: i64, window_hours: f64) -> bool {
    signal.symbol == symbol
        && signal.timeframe == timeframe
        && ((signal.timestamp - center).abs() as f64) <= window_hours * 3600.0
}

fn most_recent(signals: &[Signal], limit: usize) -> Vec<Signal> {
    signals.iter().rev().take(limit).cloned().collect()
}

// ─── In-memory ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySignalStore {
    signals: Mutex<Vec<Signal>>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored signal in persistence order.
    pub fn all(&self) -> Vec<Signal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalStore for MemorySignalStore {
    fn signal_exists_in_window(
        &self,
        symbol: &str,
        timeframe: &str,
        center: i64,
        window_hours: f64,
    ) -> Result<bool, StoreError> {
        let signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(signals
            .iter()
            .any(|s| within_window(s, symbol, timeframe, center, window_hours)))
    }

    fn persist_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal.clone());
        Ok(())
    }

    fn mark_notified(&self, id: &str) -> Result<(), StoreError> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        let signal = signals
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::UnknownSignal(id.to_string()))?;
        signal.notified = true;
        Ok(())
    }

    fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError> {
        Ok(most_recent(
            &self.signals.lock().unwrap_or_else(PoisonError::into_inner),
            limit,
        ))
    }
}

// ─── JSONL ───────────────────────────────────────────────────────────

/// One line of the signal log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum StoreRecord {
    Signal(Signal),
    Notified { id: String },
}

/// Append-only JSONL signal log.
///
/// Each accepted signal is one `{"record":"signal",...}` line; a later
/// `{"record":"notified","id":...}` line flips its flag. Reads replay the
/// whole file and skip malformed lines, so a torn final write loses at most
/// that record.
#[derive(Debug)]
pub struct JsonlSignalStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSignalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &StoreRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }

    /// Replay the log into signals, in persistence order.
    pub fn read_all(&self) -> Result<Vec<Signal>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut signals: Vec<Signal> = Vec::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoreRecord>(&line) {
                Ok(StoreRecord::Signal(signal)) => signals.push(signal),
                Ok(StoreRecord::Notified { id }) => {
                    if let Some(s) = signals.iter_mut().find(|s| s.id == id) {
                        s.notified = true;
                    }
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(path = %self.path.display(), skipped, "skipped malformed signal records");
        }
        Ok(signals)
    }
}

impl SignalStore for JsonlSignalStore {
    fn signal_exists_in_window(
        &self,
        symbol: &str,
        timeframe: &str,
        center: i64,
        window_hours: f64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .read_all()?
            .iter()
            .any(|s| within_window(s, symbol, timeframe, center, window_hours)))
    }

    fn persist_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        self.append(&StoreRecord::Signal(signal.clone()))
    }

    fn mark_notified(&self, id: &str) -> Result<(), StoreError> {
        if !self.read_all()?.iter().any(|s| s.id == id) {
            return Err(StoreError::UnknownSignal(id.to_string()));
        }
        self.append(&StoreRecord::Notified { id: id.to_string() })
    }

    fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError> {
        Ok(most_recent(&self.read_all()?, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::fixtures::signal;

    const T0: i64 = 1_704_067_200;

    fn stores() -> (tempfile::TempDir, Vec<Box<dyn SignalStore>>) {
        let dir = tempfile::tempdir().unwrap();
        let jsonl = JsonlSignalStore::new(dir.path().join("nested").join("signals.jsonl"));
        (dir, vec![Box::new(MemorySignalStore::new()), Box::new(jsonl)])
    }

    #[test]
    fn window_is_inclusive_and_keyed() {
        let (_dir, stores) = stores();
        for store in &stores {
            store.persist_signal(&signal("BTC", "1h", T0, 1.8)).unwrap();
            let four_hours = 4 * 3600;
            assert!(store.signal_exists_in_window("BTC", "1h", T0 + four_hours, 4.0).unwrap());
            assert!(store.signal_exists_in_window("BTC", "1h", T0 - four_hours, 4.0).unwrap());
            assert!(!store.signal_exists_in_window("BTC", "1h", T0 + four_hours + 1, 4.0).unwrap());
            assert!(!store.signal_exists_in_window("BTC", "4h", T0, 4.0).unwrap());
            assert!(!store.signal_exists_in_window("ETH", "1h", T0, 4.0).unwrap());
        }
    }

    #[test]
    fn mark_notified_flips_flag() {
        let (_dir, stores) = stores();
        for store in &stores {
            let s = signal("BTC", "1h", T0, 2.7);
            store.persist_signal(&s).unwrap();
            store.mark_notified(&s.id).unwrap();
            let recent = store.recent_signals(10).unwrap();
            assert_eq!(recent.len(), 1);
            assert!(recent[0].notified);
            assert!(matches!(
                store.mark_notified("missing"),
                Err(StoreError::UnknownSignal(_))
            ));
        }
    }

    #[test]
    fn recent_is_newest_first() {
        let (_dir, stores) = stores();
        for store in &stores {
            for i in 0..5 {
                store.persist_signal(&signal("BTC", "1h", T0 + i * 86_400, 1.5)).unwrap();
            }
            let recent = store.recent_signals(2).unwrap();
            assert_eq!(recent.len(), 2);
            assert_eq!(recent[0].timestamp, T0 + 4 * 86_400);
            assert_eq!(recent[1].timestamp, T0 + 3 * 86_400);
        }
    }

    #[test]
    fn jsonl_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSignalStore::new(dir.path().join("none.jsonl"));
        assert!(store.read_all().unwrap().is_empty());
        assert!(!store.signal_exists_in_window("BTC", "1h", T0, 4.0).unwrap());
    }

    #[test]
    fn jsonl_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.jsonl");
        let store = JsonlSignalStore::new(&path);
        store.persist_signal(&signal("BTC", "1h", T0, 1.8)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"record\":\"signal\",\"id\":").unwrap();
        writeln!(file).unwrap();
        drop(file);

        store.persist_signal(&signal("ETH", "1h", T0, 2.0)).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].symbol, "ETH");
    }

    #[test]
    fn jsonl_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.jsonl");
        let s = signal("BTC", "1h", T0, 3.1);
        {
            let store = JsonlSignalStore::new(&path);
            store.persist_signal(&s).unwrap();
            store.mark_notified(&s.id).unwrap();
        }
        let reopened = JsonlSignalStore::new(&path);
        assert_eq!(reopened.read_all().unwrap(), vec![Signal { notified: true, ..s }]);
    }
}
