use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WatchError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Time between polling ticks
    #[serde(rename = "check_interval_ms", with = "millis")]
    pub check_interval: Duration,
    /// Consecutive no-change ticks needed to declare the page loaded
    pub steady_intervals_required: u32,
    /// Ticks without a steady state before the watch times out
    pub max_intervals: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(500),
            steady_intervals_required: 5,
            max_intervals: 20,
        }
    }
}

impl WatchConfig {
    pub fn with_check_interval(mut self, ms: u64) -> Self {
        self.check_interval = Duration::from_millis(ms);
        self
    }

    pub fn with_steady_intervals(mut self, intervals: u32) -> Self {
        self.steady_intervals_required = intervals;
        self
    }

    pub fn with_max_intervals(mut self, intervals: u32) -> Self {
        self.max_intervals = intervals;
        self
    }

    pub fn fast() -> Self {
        Self {
            check_interval: Duration::from_millis(200),
            steady_intervals_required: 3,
            max_intervals: 25,
        }
    }

    pub fn patient() -> Self {
        Self {
            check_interval: Duration::from_millis(1000),
            steady_intervals_required: 5,
            max_intervals: 60,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(WatchError::InvalidConfig("check interval must be non-zero"));
        }
        if self.steady_intervals_required == 0 {
            return Err(WatchError::InvalidConfig("steady threshold must be at least one interval"));
        }
        if self.steady_intervals_required >= self.max_intervals {
            return Err(WatchError::Configuration {
                steady: self.steady_intervals_required,
                max: self.max_intervals,
            });
        }
        Ok(())
    }

    /// Wall-clock budget spent on not-yet-loaded ticks before timing out
    pub fn budget(&self) -> Duration {
        self.check_interval * self.max_intervals
    }
}

/// Serde adapter encoding a `Duration` as integer milliseconds
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
