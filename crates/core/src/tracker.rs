use crate::config::WatchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerVerdict {
    Loaded,
    Pending,
    TimedOut,
}

/// Counts consecutive steady ticks against the configured thresholds.
///
/// The elapsed counter only advances on ticks that did not reach the steady
/// threshold, so a watch times out after `max_intervals + 1` unsettled ticks.
#[derive(Debug, Clone)]
pub struct SteadyStateTracker {
    steady_intervals_required: u32,
    max_intervals: u32,
    consecutive_steady_intervals: u32,
    elapsed_intervals: u32,
}

impl SteadyStateTracker {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            steady_intervals_required: config.steady_intervals_required,
            max_intervals: config.max_intervals,
            consecutive_steady_intervals: 0,
            elapsed_intervals: 0,
        }
    }

    pub fn record(&mut self, changed: bool) -> TrackerVerdict {
        if changed {
            self.consecutive_steady_intervals = 0;
        } else {
            self.consecutive_steady_intervals += 1;
        }

        if self.consecutive_steady_intervals >= self.steady_intervals_required {
            return TrackerVerdict::Loaded;
        }

        self.elapsed_intervals += 1;
        if self.elapsed_intervals > self.max_intervals {
            TrackerVerdict::TimedOut
        } else {
            TrackerVerdict::Pending
        }
    }

    pub fn consecutive_steady_intervals(&self) -> u32 {
        self.consecutive_steady_intervals
    }

    pub fn elapsed_intervals(&self) -> u32 {
        self.elapsed_intervals
    }
}
