//! Cycle scheduling for the scan loop.
//!
//! A [`Ticker`] decides when the next cycle starts and when the loop ends.
//! Tests drive the loop with [`CycleLimit`], which never sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity of the stop-flag check while waiting.
const STOP_POLL: Duration = Duration::from_millis(200);

pub trait Ticker {
    /// Block until the next cycle is due. Returns `false` when the loop
    /// should end instead.
    fn wait_next(&mut self, stop: Option<&AtomicBool>) -> bool;
}

fn stopped(stop: Option<&AtomicBool>) -> bool {
    stop.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Runs exactly `n` cycles back to back.
#[derive(Debug, Clone)]
pub struct CycleLimit {
    remaining: usize,
}

impl CycleLimit {
    pub fn new(cycles: usize) -> Self {
        Self { remaining: cycles }
    }
}

impl Ticker for CycleLimit {
    fn wait_next(&mut self, stop: Option<&AtomicBool>) -> bool {
        if self.remaining == 0 || stopped(stop) {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Fixed-interval ticker. The first cycle starts immediately; later cycles
/// start `interval` after the previous one started, or right away if the
/// previous cycle overran.
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    interval: Duration,
    max_cycles: Option<usize>,
    started: usize,
    last_start: Option<Instant>,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_cycles: None,
            started: 0,
            last_start: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<usize>) -> Self {
        self.max_cycles = max_cycles;
        self
    }
}

impl Ticker for IntervalTicker {
    fn wait_next(&mut self, stop: Option<&AtomicBool>) -> bool {
        if self.max_cycles.is_some_and(|max| self.started >= max) {
            return false;
        }
        if let Some(last) = self.last_start {
            let due = last + self.interval;
            loop {
                if stopped(stop) {
                    return false;
                }
                let now = Instant::now();
                if now >= due {
                    break;
                }
                std::thread::sleep((due - now).min(STOP_POLL));
            }
        }
        if stopped(stop) {
            return false;
        }
        self.started += 1;
        self.last_start = Some(Instant::now());
        true
    }
}
