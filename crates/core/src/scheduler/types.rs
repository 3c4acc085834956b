//! Types for the cyclic scheduler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors an action can report from a single execution.
///
/// The scheduler logs these and keeps ticking; they never stop a worker.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action could not complete its work this cycle.
    #[error("action failed: {0}")]
    Failed(String),
}

/// A unit of work driven by a [`Scheduler`](super::Scheduler).
///
/// Only `execute` is required. The optional signals default to an always
/// enabled, never active, never preventing action with nothing to restore.
#[async_trait]
pub trait Action: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Run one cycle of work.
    async fn execute(&self) -> Result<(), ActionError>;

    /// Disabled actions are skipped and re-checked after a backoff.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether the action is currently doing work.
    fn is_active(&self) -> bool {
        false
    }

    /// When true a due cycle is skipped (and not retried until the next one).
    fn prevent_run(&self) -> bool {
        false
    }

    /// Invoked once before the first tick. Errors are discarded.
    async fn restore_state(&self) -> Result<(), ActionError> {
        Ok(())
    }
}

/// External "skip this cycle" predicate supplied at construction.
pub type PreventCycle = Box<dyn Fn() -> bool + Send + Sync>;

/// Observable state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Not running: never started, or stopped.
    Stopped,
    /// Running but paused; no ticks are evaluated.
    Paused,
    /// Running and waiting for the next due cycle.
    Waiting,
    /// The action is executing right now.
    Executing,
}

/// Why a due cycle did not execute the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Outside the configured start-time window.
    OutsideStartWindow,
    /// The external prevent-cycle predicate returned true.
    PreventCycle,
    /// The action's own prevent-run signal was set.
    PreventRun,
}

/// Result of a single scheduler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cycle time has not elapsed and nothing was forced.
    NotDue,
    /// The action is disabled; the decision logic was skipped.
    Disabled,
    /// A due cycle was skipped and `last_run` advanced.
    Skipped(SkipReason),
    /// The action ran and returned Ok.
    Ran,
    /// The action ran and returned an error (already logged).
    Failed,
}
