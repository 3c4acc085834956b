//! Storage trait for cached releases and per-source timestamps.

use super::{CacheEntry, CacheError, EntryQuery};

/// Persistent store shared by every source's ingestion and matching.
///
/// Timestamps are epoch seconds; `None` means the source has never been
/// refreshed (or searched).
pub trait CacheStore: Send + Sync {
    fn last_refresh(&self, source_id: &str) -> Result<Option<i64>, CacheError>;

    fn set_last_refresh(&self, source_id: &str, epoch: i64) -> Result<(), CacheError>;

    fn last_consumed(&self, source_id: &str) -> Result<Option<i64>, CacheError>;

    fn set_last_consumed(&self, source_id: &str, epoch: i64) -> Result<(), CacheError>;

    /// Insert entries, ignoring ones whose logical key already exists.
    ///
    /// Runs in a single transaction. Returns the number of new rows.
    fn insert_entries(&self, entries: &[CacheEntry]) -> Result<usize, CacheError>;

    /// Delete every entry of `source_id`, then insert `entries`, atomically.
    ///
    /// Readers never observe the source's rows missing in between.
    fn replace_entries(&self, source_id: &str, entries: &[CacheEntry])
        -> Result<usize, CacheError>;

    /// Entries of one source for one show/season that contain the episode
    /// and have an acceptable quality.
    fn find_entries(&self, query: &EntryQuery) -> Result<Vec<CacheEntry>, CacheError>;

    /// Proper/repack/real re-releases of a source, optionally only those
    /// fetched at or after `since`. Entries without an owning show are
    /// excluded.
    fn list_propers(&self, source_id: &str, since: Option<i64>)
        -> Result<Vec<CacheEntry>, CacheError>;

    /// Number of entries stored for a source.
    fn count(&self, source_id: &str) -> Result<usize, CacheError>;
}
