//! Per-source release cache.
//!
//! Sources are polled on their own schedule; each raw item is parsed into a
//! [`CacheEntry`] and persisted with insert-if-absent semantics. Callers then
//! ask the [`ReleaseMatcher`] which cached releases satisfy the episodes they
//! still want.
//!
//! Two per-source timestamps coordinate ingestion and matching:
//! - `last_refresh` is stamped after every refresh pass.
//! - `last_consumed` is stamped after every match query.
//!
//! Stored rows are only replaced once they have been consumed since the last
//! refresh, so a refresh never discards rows nobody has looked at yet.

mod ingest;
mod matcher;
mod source;
mod sqlite;
mod store;
mod types;

pub use ingest::{SourceCache, SourceCacheConfig};
pub use matcher::{MatcherConfig, ReleaseMatcher};
pub use source::{FetchOptions, RawItem, SourceConnector, SourceError};
pub use sqlite::SqliteCacheStore;
pub use store::CacheStore;
pub use types::*;
