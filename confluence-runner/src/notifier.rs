//! Alert delivery.

use thiserror::Error;
use tracing::info;

use crate::signal::Signal;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Receives signals that cleared the notification threshold.
pub trait Notifier: Send + Sync {
    fn notify(&self, signal: &Signal) -> Result<(), NotifyError>;
}

/// Plain-text alert body.
pub fn format_alert(signal: &Signal) -> String {
    let time = signal
        .time()
        .map_or_else(|| signal.timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string());
    let mut text = format!(
        "{} {} signal: {} @ {:.4}\n\
         Score: {:.2} | Timeframe: {} | Time: {}\n\
         Breakdown: {}\n\
         Volume: {} ({:.2}x)",
        signal.classification,
        signal.direction,
        signal.symbol,
        signal.price,
        signal.score,
        signal.timeframe,
        time,
        signal.indicator_breakdown,
        signal.volume_level,
        signal.volume_ratio,
    );
    if !signal.details.is_empty() {
        text.push_str("\nFactors: ");
        text.push_str(&signal.details);
    }
    text
}

/// Writes alerts to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, signal: &Signal) -> Result<(), NotifyError> {
        info!(
            symbol = %signal.symbol,
            timeframe = %signal.timeframe,
            score = signal.score,
            "ALERT\n{}",
            format_alert(signal)
        );
        Ok(())
    }
}
