//! Directional "system" attached to events, results and watchlist entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directional bias of an event or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum System {
    Bullish,
    Bearish,
}

impl System {
    pub fn opposite(self) -> Self {
        match self {
            System::Bullish => System::Bearish,
            System::Bearish => System::Bullish,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            System::Bullish => "bullish",
            System::Bearish => "bearish",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for System {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" | "long" => Ok(System::Bullish),
            "bearish" | "short" => Ok(System::Bearish),
            other => Err(format!("unknown direction '{other}' (expected bullish or bearish)")),
        }
    }
}
