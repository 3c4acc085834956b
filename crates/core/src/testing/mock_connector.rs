//! Mock source connector for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::{FetchOptions, RawItem, SourceConnector, SourceError};

/// Mock implementation of the SourceConnector trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable raw items
/// - Simulate authentication and fetch failures
/// - Track fetches and the options they were called with
#[derive(Debug)]
pub struct MockConnector {
    source_id: String,
    anime_only: bool,
    items: Mutex<Vec<RawItem>>,
    fetches: AtomicUsize,
    last_options: Mutex<Option<FetchOptions>>,
    auth_failure: AtomicBool,
    fetch_failure: Mutex<Option<String>>,
}

impl MockConnector {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            anime_only: false,
            items: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            last_options: Mutex::new(None),
            auth_failure: AtomicBool::new(false),
            fetch_failure: Mutex::new(None),
        }
    }

    /// Restrict the source to anime.
    pub fn anime_only(mut self) -> Self {
        self.anime_only = true;
        self
    }

    /// Items returned by every following fetch.
    pub fn set_items(&self, items: Vec<RawItem>) {
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    pub fn set_auth_failure(&self, fail: bool) {
        self.auth_failure.store(fail, Ordering::SeqCst);
    }

    /// Make every following fetch fail with this message (`None` clears).
    pub fn set_fetch_failure(&self, message: Option<&str>) {
        *self.fetch_failure.lock().unwrap_or_else(|e| e.into_inner()) =
            message.map(str::to_string);
    }

    /// Number of fetch attempts, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<FetchOptions> {
        self.last_options
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn name(&self) -> &str {
        &self.source_id
    }

    fn anime_only(&self) -> bool {
        self.anime_only
    }

    async fn check_auth(&self) -> Result<(), SourceError> {
        if self.auth_failure.load(Ordering::SeqCst) {
            return Err(SourceError::Authentication(format!(
                "invalid credentials for {}",
                self.source_id
            )));
        }
        Ok(())
    }

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap_or_else(|e| e.into_inner()) = Some(options.clone());

        let failure = self
            .fetch_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(message) = failure {
            return Err(SourceError::Fetch(message));
        }
        Ok(self.items.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
