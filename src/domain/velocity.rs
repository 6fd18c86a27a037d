//! Sliding-window velocity counters (§3 VelocityCounters, §4.2, §4.10).

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    FiveMin,
    OneHour,
    TwentyFourHour,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::FiveMin, Window::OneHour, Window::TwentyFourHour];

    pub fn as_str(self) -> &'static str {
        match self {
            Window::FiveMin => "5m",
            Window::OneHour => "1h",
            Window::TwentyFourHour => "24h",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            Window::FiveMin => Duration::from_secs(5 * 60),
            Window::OneHour => Duration::from_secs(60 * 60),
            Window::TwentyFourHour => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Result of an `incrementVelocity` call: the post-increment count and
/// cumulative amount for one window. On cache failure both fields are zero
/// and the analyzer degrades to "no velocity data" (§4.10).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VelocityCounters {
    pub count: u64,
    pub total_amount: f64,
}
