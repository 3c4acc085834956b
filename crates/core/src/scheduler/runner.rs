//! Cyclic scheduler implementation.
//!
//! One `Scheduler` owns one [`Action`] and drives it from its own tokio task:
//! - Ticks are strictly sequential; the action never runs twice concurrently
//!   from the same scheduler.
//! - `last_run` advances before the action is invoked, so a hanging or
//!   failing action is re-entered at most once per cycle.
//! - Stop is cooperative: an in-flight execution always completes.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveTime, TimeDelta, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::metrics;

use super::config::SchedulerConfig;
use super::types::{Action, PreventCycle, SchedulerState, SkipReason, TickOutcome};

/// Pause/stop flags shared between the handle methods and the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Control {
    paused: bool,
    stop_requested: bool,
}

/// Drives one action on a fixed cycle.
pub struct Scheduler {
    name: String,
    action: Arc<dyn Action>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    prevent_cycle: Option<PreventCycle>,

    // Runtime state
    last_run: Mutex<DateTime<Local>>,
    force: AtomicBool,
    executing: AtomicBool,
    running: AtomicBool,
    control: watch::Sender<Control>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("last_run", &self.last_run())
            .field("state", &self.state())
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler for `action`.
    ///
    /// `last_run` starts at `now + run_delay - cycle_time`, so with no delay
    /// the first tick is immediately due. An unrepresentable start falls
    /// back to the epoch.
    pub fn new(
        name: impl Into<String>,
        action: Arc<dyn Action>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let last_run = clock
            .now()
            .checked_add_signed(config.run_delay())
            .and_then(|t| t.checked_sub_signed(config.cycle_time()))
            .unwrap_or_else(crate::clock::epoch);
        let (control, _) = watch::channel(Control {
            paused: config.paused,
            stop_requested: false,
        });

        Self {
            name: name.into(),
            action,
            config,
            clock,
            prevent_cycle: None,
            last_run: Mutex::new(last_run),
            force: AtomicBool::new(false),
            executing: AtomicBool::new(false),
            running: AtomicBool::new(false),
            control,
        }
    }

    /// Attach an external predicate that can veto a due cycle.
    pub fn with_prevent_cycle<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.prevent_cycle = Some(Box::new(predicate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn last_run(&self) -> DateTime<Local> {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state of the state machine.
    pub fn state(&self) -> SchedulerState {
        if !self.running.load(Ordering::SeqCst) {
            SchedulerState::Stopped
        } else if self.executing.load(Ordering::SeqCst) {
            SchedulerState::Executing
        } else if self.control.borrow().paused {
            SchedulerState::Paused
        } else {
            SchedulerState::Waiting
        }
    }

    pub fn is_paused(&self) -> bool {
        self.control.borrow().paused
    }

    /// Pause the loop. No-op once a stop was requested.
    pub fn pause(&self) {
        self.control.send_if_modified(|c| {
            if c.stop_requested || c.paused {
                return false;
            }
            c.paused = true;
            true
        });
    }

    /// Resume a paused loop. Takes effect at the next tick boundary.
    pub fn resume(&self) {
        self.control.send_if_modified(|c| {
            if c.stop_requested || !c.paused {
                return false;
            }
            c.paused = false;
            true
        });
    }

    /// Request a cooperative stop and unblock a paused loop.
    pub fn stop(&self) {
        self.control.send_modify(|c| {
            c.stop_requested = true;
            c.paused = false;
        });
    }

    /// Request one run that bypasses the interval check.
    ///
    /// Returns false without side effects if the action is executing.
    pub fn force_run(&self) -> bool {
        if self.action.is_active() || self.executing.load(Ordering::SeqCst) {
            return false;
        }
        self.force.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_forced(&self) -> bool {
        self.force.load(Ordering::SeqCst)
    }

    /// Time until the next natural run: `cycle_time - (now - last_run)`.
    pub fn time_left(&self) -> TimeDelta {
        self.config.cycle_time() - (self.clock.now() - self.last_run())
    }

    /// Restart the cycle from now. `last_run` never moves backward.
    pub fn reset(&self) {
        self.advance_last_run(self.clock.now());
    }

    fn advance_last_run(&self, to: DateTime<Local>) {
        let mut last_run = self.last_run.lock().unwrap_or_else(|e| e.into_inner());
        if to > *last_run {
            *last_run = to;
        }
    }

    /// One decision pass of the loop.
    pub async fn tick(&self) -> TickOutcome {
        if !self.action.is_enabled() {
            return TickOutcome::Disabled;
        }

        let now = self.clock.now();
        let forced = self.force.load(Ordering::SeqCst);
        let mut should_run = false;
        let mut skipped = None;

        if now - self.last_run() >= self.config.cycle_time() {
            match self.config.start_time {
                Some(start) if !in_start_window(now, start, self.config.cycle_hours()) => {
                    // only re-check the window after another full cycle
                    self.advance_last_run(now);
                    skipped = Some(SkipReason::OutsideStartWindow);
                }
                _ => should_run = true,
            }
        }

        if forced {
            should_run = true;
        }

        if should_run {
            let prevented = if self.prevent_cycle.as_ref().is_some_and(|p| p()) {
                Some(SkipReason::PreventCycle)
            } else if self.action.prevent_run() {
                Some(SkipReason::PreventRun)
            } else {
                None
            };

            if let Some(reason) = prevented {
                warn!("{} skipping this cycle ({:?})", self.name, reason);
                self.advance_last_run(now);
                should_run = false;
                skipped = Some(reason);
            }
        }

        let outcome = if should_run {
            self.advance_last_run(now);
            self.execute().await
        } else if let Some(reason) = skipped {
            metrics::SCHEDULER_RUNS
                .with_label_values(&[self.name.as_str(), "skipped"])
                .inc();
            TickOutcome::Skipped(reason)
        } else {
            TickOutcome::NotDue
        };

        if forced {
            self.force.store(false, Ordering::SeqCst);
        }

        outcome
    }

    async fn execute(&self) -> TickOutcome {
        if !self.config.silent {
            debug!("Starting scheduled run: {}", self.name);
        }

        self.executing.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let action = Arc::clone(&self.action);
        // A separate task turns a panicking action into a JoinError instead of
        // taking the whole worker down.
        let result = tokio::spawn(async move { action.execute().await }).await;
        self.executing.store(false, Ordering::SeqCst);
        metrics::SCHEDULER_RUN_DURATION
            .with_label_values(&[self.name.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(())) => {
                metrics::SCHEDULER_RUNS
                    .with_label_values(&[self.name.as_str(), "success"])
                    .inc();
                TickOutcome::Ran
            }
            Ok(Err(e)) => {
                error!(
                    "Error in scheduled task {}: {}",
                    self.name,
                    error_chain(&e)
                );
                metrics::SCHEDULER_RUNS
                    .with_label_values(&[self.name.as_str(), "failed"])
                    .inc();
                TickOutcome::Failed
            }
            Err(e) => {
                error!("Scheduled task {} crashed: {:?}", self.name, e);
                metrics::SCHEDULER_RUNS
                    .with_label_values(&[self.name.as_str(), "failed"])
                    .inc();
                TickOutcome::Failed
            }
        }
    }

    /// Run the loop until `stop()` is called.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler {} already running", self.name);
            return;
        }

        info!("Scheduler {} started", self.name);

        if let Err(e) = self.action.restore_state().await {
            debug!("Ignoring state restore failure for {}: {}", self.name, e);
        }

        let mut control = self.control.subscribe();
        loop {
            // blocks while paused; stop() also clears the pause
            let stop_requested = match control.wait_for(|c| !c.paused || c.stop_requested).await {
                Ok(c) => c.stop_requested,
                Err(_) => true,
            };
            if stop_requested {
                break;
            }

            let delay = if self.action.is_enabled() {
                self.tick().await;
                self.config.poll_interval()
            } else {
                self.config.disabled_backoff() + self.config.poll_interval()
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = async {
                    let _ = control.wait_for(|c| c.stop_requested).await;
                } => {}
            }
        }

        self.force.store(false, Ordering::SeqCst);
        self.control.send_modify(|c| *c = Control::default());
        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler {} stopped", self.name);
    }

    /// Spawn the loop on the tokio runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Stop and wait for the loop to exit, giving up after `timeout`.
    pub async fn shutdown(&self, handle: JoinHandle<()>, timeout: Duration) {
        self.stop();
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!(
                "Scheduler {} did not stop within {:?}; leaving it to finish",
                self.name, timeout
            );
        }
    }
}

/// `0 <= now.hour - start.hour < cycle_hours`.
fn in_start_window(now: DateTime<Local>, start: NaiveTime, cycle_hours: i64) -> bool {
    let hour_diff = now.hour() as i64 - start.hour() as i64;
    hour_diff >= 0 && hour_diff < cycle_hours
}

fn error_chain(e: &dyn StdError) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
