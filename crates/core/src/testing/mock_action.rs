//! Mock scheduled action for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::scheduler::{Action, ActionError};

/// Mock implementation of the Action trait.
///
/// Counts executions and restores, and exposes every optional signal as a
/// settable flag.
#[derive(Debug)]
pub struct MockAction {
    name: String,
    runs: AtomicUsize,
    restores: AtomicUsize,
    enabled: AtomicBool,
    active: AtomicBool,
    prevent_run: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl MockAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
            enabled: AtomicBool::new(true),
            active: AtomicBool::new(false),
            prevent_run: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    /// Number of completed `execute` calls, failed ones included.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn set_prevent_run(&self, prevent: bool) {
        self.prevent_run.store(prevent, Ordering::SeqCst);
    }

    /// Make every following execution fail with this message (`None` clears).
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = message.map(str::to_string);
    }
}

#[async_trait]
impl Action for MockAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ActionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(message) => Err(ActionError::Failed(message)),
            None => Ok(()),
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn prevent_run(&self) -> bool {
        self.prevent_run.load(Ordering::SeqCst)
    }

    async fn restore_state(&self) -> Result<(), ActionError> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
