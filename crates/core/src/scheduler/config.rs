//! Scheduler configuration.

use std::time::Duration;

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for cycle and delay lengths (ten years).
pub const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 3600;

/// Configuration for one cyclic scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum interval between two executions (seconds).
    #[serde(default = "default_cycle_time")]
    pub cycle_time_secs: u64,

    /// Delay before the first execution may happen (seconds).
    /// Zero means the first tick runs the action immediately.
    #[serde(default)]
    pub run_delay_secs: u64,

    /// Optional time-of-day anchor. When set, a due cycle only runs if the
    /// current hour lies in `[start.hour, start.hour + cycle hours)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,

    /// Start in the paused state.
    #[serde(default)]
    pub paused: bool,

    /// Suppress the per-run "starting" debug line.
    #[serde(default = "default_silent")]
    pub silent: bool,

    /// Tick granularity of the loop (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long to sleep when the action reports itself disabled (seconds).
    #[serde(default = "default_disabled_backoff")]
    pub disabled_backoff_secs: u64,
}

fn default_cycle_time() -> u64 {
    600 // 10 minutes
}

fn default_silent() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_disabled_backoff() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_time_secs: default_cycle_time(),
            run_delay_secs: 0,
            start_time: None,
            paused: false,
            silent: default_silent(),
            poll_interval_ms: default_poll_interval(),
            disabled_backoff_secs: default_disabled_backoff(),
        }
    }
}

impl SchedulerConfig {
    /// Config with the given cycle time and defaults for everything else.
    pub fn every(cycle: Duration) -> Self {
        Self {
            cycle_time_secs: cycle.as_secs(),
            ..Default::default()
        }
    }

    pub fn cycle_time(&self) -> TimeDelta {
        TimeDelta::seconds(self.cycle_time_secs.min(i64::MAX as u64 / 1000) as i64)
    }

    pub fn run_delay(&self) -> TimeDelta {
        TimeDelta::seconds(self.run_delay_secs.min(i64::MAX as u64 / 1000) as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn disabled_backoff(&self) -> Duration {
        Duration::from_secs(self.disabled_backoff_secs)
    }

    /// Whole hours in one cycle, used by the start-time window.
    pub fn cycle_hours(&self) -> i64 {
        (self.cycle_time_secs / 3600) as i64
    }
}
