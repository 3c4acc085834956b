//! Cache store wrapper with injectable failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheError, CacheStore, EntryQuery};

/// Delegates to an inner store unless a failure switch is on.
///
/// - `set_fail_queries`: `find_entries` fails
/// - `set_fail_writes`: `insert_entries` and `replace_entries` fail
/// - `set_fail_timestamps`: reading `last_refresh`/`last_consumed` fails
pub struct FailingStore {
    inner: Arc<dyn CacheStore>,
    fail_queries: AtomicBool,
    fail_writes: AtomicBool,
    fail_timestamps: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn CacheStore>) -> Self {
        Self {
            inner,
            fail_queries: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_timestamps: AtomicBool::new(false),
        }
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_timestamps(&self, fail: bool) {
        self.fail_timestamps.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), CacheError> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Database("disk I/O error".to_string()));
        }
        Ok(())
    }
}

impl CacheStore for FailingStore {
    fn last_refresh(&self, source_id: &str) -> Result<Option<i64>, CacheError> {
        Self::check(&self.fail_timestamps)?;
        self.inner.last_refresh(source_id)
    }

    fn set_last_refresh(&self, source_id: &str, epoch: i64) -> Result<(), CacheError> {
        self.inner.set_last_refresh(source_id, epoch)
    }

    fn last_consumed(&self, source_id: &str) -> Result<Option<i64>, CacheError> {
        Self::check(&self.fail_timestamps)?;
        self.inner.last_consumed(source_id)
    }

    fn set_last_consumed(&self, source_id: &str, epoch: i64) -> Result<(), CacheError> {
        self.inner.set_last_consumed(source_id, epoch)
    }

    fn insert_entries(&self, entries: &[CacheEntry]) -> Result<usize, CacheError> {
        Self::check(&self.fail_writes)?;
        self.inner.insert_entries(entries)
    }

    fn replace_entries(
        &self,
        source_id: &str,
        entries: &[CacheEntry],
    ) -> Result<usize, CacheError> {
        Self::check(&self.fail_writes)?;
        self.inner.replace_entries(source_id, entries)
    }

    fn find_entries(&self, query: &EntryQuery) -> Result<Vec<CacheEntry>, CacheError> {
        Self::check(&self.fail_queries)?;
        self.inner.find_entries(query)
    }

    fn list_propers(
        &self,
        source_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        self.inner.list_propers(source_id, since)
    }

    fn count(&self, source_id: &str) -> Result<usize, CacheError> {
        self.inner.count(source_id)
    }
}
