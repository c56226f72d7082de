//! Domain types shared by the indicator, detector and confluence layers.

pub mod candle;
pub mod system;

pub use candle::{hours_between, sanitize_window, Candle, CandleError, SanitizedWindow};
pub use system::System;
