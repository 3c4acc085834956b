//! Cyclic task scheduler.
//!
//! Each registered [`Action`] gets its own [`Scheduler`] running as an
//! independent tokio task:
//! - **Pause/resume**: gate the loop without losing `last_run`.
//! - **Force**: bypass the interval check exactly once.
//! - **Start-time window**: only run due cycles inside an hour window.
//! - **Crash isolation**: action errors and panics are logged, never fatal.

mod config;
mod runner;
mod types;

pub use config::{SchedulerConfig, MAX_INTERVAL_SECS};
pub use runner::Scheduler;
pub use types::{Action, ActionError, PreventCycle, SchedulerState, SkipReason, TickOutcome};
