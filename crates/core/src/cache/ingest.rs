//! Ingestion of raw source items into the cache.
//!
//! One `SourceCache` per source. A refresh pass:
//! 1. checks credentials (failure aborts the pass, nothing is touched)
//! 2. returns early unless the refresh interval has elapsed
//! 3. fetches raw items and parses each into a [`CacheEntry`]
//! 4. replaces the stored rows if they were consumed since the last refresh,
//!    otherwise only adds new rows
//! 5. stamps `last_refresh`, even when the source returned nothing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta};
use tracing::{debug, error, info, warn};

use super::{
    CacheEntry, CacheError, CacheStore, EpisodeSet, FetchOptions, RefreshState, SourceConnector,
    SourceError,
};
use crate::clock::{self, Clock};
use crate::metrics;
use crate::release::{NameParser, ParseHint};
use crate::scheduler::{Action, ActionError};
use crate::show::{Show, ShowDirectory, ShowId};

/// Per-source ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCacheConfig {
    /// Minimum time between two refresh passes.
    pub refresh_interval: TimeDelta,
    /// Disabled sources are skipped by their scheduler.
    pub enabled: bool,
}

impl Default for SourceCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: TimeDelta::minutes(10),
            enabled: true,
        }
    }
}

/// Ingestion pipeline for one source.
pub struct SourceCache {
    connector: Arc<dyn SourceConnector>,
    store: Arc<dyn CacheStore>,
    parser: Arc<dyn NameParser>,
    shows: Arc<dyn ShowDirectory>,
    config: SourceCacheConfig,
    clock: Arc<dyn Clock>,
    task_name: String,
    active: AtomicBool,
}

impl SourceCache {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        store: Arc<dyn CacheStore>,
        parser: Arc<dyn NameParser>,
        shows: Arc<dyn ShowDirectory>,
        config: SourceCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let task_name = format!("cache:{}", connector.source_id());
        Self {
            connector,
            store,
            parser,
            shows,
            config,
            clock,
            task_name,
            active: AtomicBool::new(false),
        }
    }

    pub fn source_id(&self) -> &str {
        self.connector.source_id()
    }

    pub fn config(&self) -> &SourceCacheConfig {
        &self.config
    }

    /// Stored refresh/consumption times.
    ///
    /// Missing values read as the epoch; values in the future are treated as
    /// corrupt and reset to the epoch.
    pub fn refresh_state(&self) -> Result<RefreshState, CacheError> {
        let now = self.clock.now();
        let source_id = self.source_id();
        let last_refresh = self.checked_time(self.store.last_refresh(source_id)?, now);
        let last_consumed = self.checked_time(self.store.last_consumed(source_id)?, now);
        Ok(RefreshState {
            last_refresh,
            last_consumed,
        })
    }

    fn checked_time(&self, stored: Option<i64>, now: DateTime<Local>) -> DateTime<Local> {
        match stored.map(clock::from_epoch) {
            Some(t) if t > now => {
                warn!(
                    "Stored timestamp for {} is in the future ({}), resetting",
                    self.source_id(),
                    t
                );
                clock::epoch()
            }
            Some(t) => t,
            None => clock::epoch(),
        }
    }

    pub fn should_refresh(&self) -> Result<bool, CacheError> {
        let state = self.refresh_state()?;
        Ok(self.clock.now() - state.last_refresh >= self.config.refresh_interval)
    }

    pub fn should_purge(&self) -> Result<bool, CacheError> {
        Ok(self.refresh_state()?.should_purge())
    }

    /// Run one refresh pass. Returns the entries parsed in this pass.
    ///
    /// Failures are logged and recovered locally; an authentication failure
    /// or an unreadable refresh state yields an empty result.
    pub async fn update(&self, options: &FetchOptions) -> Vec<CacheEntry> {
        let _active = ActiveGuard::set(&self.active);
        let source_id = self.source_id();

        if let Err(e) = self.connector.check_auth().await {
            match e {
                SourceError::Authentication(_) => {
                    error!("Authentication failed for source {}: {}", source_id, e);
                }
                _ => {
                    error!("Failed to verify source {}: {}", source_id, e);
                }
            }
            metrics::CACHE_REFRESHES
                .with_label_values(&[source_id, "auth_failed"])
                .inc();
            return Vec::new();
        }

        let state = match self.refresh_state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to read refresh state of {}: {}", source_id, e);
                metrics::CACHE_REFRESHES
                    .with_label_values(&[source_id, "store_failed"])
                    .inc();
                return Vec::new();
            }
        };
        let now = self.clock.now();
        if now - state.last_refresh < self.config.refresh_interval {
            debug!("Cache for {} is fresh, skipping refresh", source_id);
            return Vec::new();
        }

        let items = match self.connector.fetch_items(options).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to fetch items from {}: {}", source_id, e);
                metrics::CACHE_REFRESHES
                    .with_label_values(&[source_id, "fetch_failed"])
                    .inc();
                Vec::new()
            }
        };

        let mut entries = Vec::new();
        for item in &items {
            let (title, url) = self.connector.title_and_url(item);
            let (Some(title), Some(url)) = (title, url) else {
                debug!("Skipping item without title or url from {}", source_id);
                metrics::CACHE_ITEMS
                    .with_label_values(&[source_id, "skipped"])
                    .inc();
                continue;
            };

            match self.parse_item(&title, &url, item.show_id) {
                Some(entry) => {
                    metrics::CACHE_ITEMS
                        .with_label_values(&[source_id, "parsed"])
                        .inc();
                    entries.push(entry);
                }
                None => {
                    metrics::CACHE_ITEMS
                        .with_label_values(&[source_id, "skipped"])
                        .inc();
                }
            }
        }

        if !items.is_empty() {
            let purge = state.should_purge();
            let stored = if purge {
                debug!("Replacing consumed cache rows for {}", source_id);
                self.store.replace_entries(source_id, &entries)
            } else {
                self.store.insert_entries(&entries)
            };
            match stored {
                Ok(inserted) => {
                    if purge {
                        metrics::CACHE_PURGES.with_label_values(&[source_id]).inc();
                    }
                    info!(
                        "Cached {} new of {} parsed items from {}",
                        inserted,
                        entries.len(),
                        source_id
                    )
                }
                Err(e) => warn!("Failed to store cache entries for {}: {}", source_id, e),
            }
        }

        if let Err(e) = self.store.set_last_refresh(source_id, now.timestamp()) {
            warn!("Failed to record refresh time for {}: {}", source_id, e);
        }
        metrics::CACHE_REFRESHES
            .with_label_values(&[source_id, "refreshed"])
            .inc();

        entries
    }

    /// Turn one raw item into a cache entry, or `None` if it cannot be used.
    pub fn parse_item(&self, title: &str, url: &str, show_hint: Option<ShowId>) -> Option<CacheEntry> {
        let name = normalize_title(title);
        let url = url.replace("&amp;", "&");

        let known_show = match show_hint {
            Some(id) => match self.shows.find_by_id(&id) {
                Ok(show) => show,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    return None;
                }
            },
            None => None,
        };

        let hint = ParseHint {
            show: known_show.as_ref(),
            release_group: None,
        };
        let mut result = match self.parser.parse(&name, &hint) {
            Ok(result) => result,
            Err(e) => {
                debug!("Unable to parse {} from {}: {}", name, self.source_id(), e);
                return None;
            }
        };

        if result.is_anime && known_show.is_none() {
            let show: Show = result.show.clone();
            let hint = ParseHint::for_show(&show).with_release_group(self.source_id());
            result = match self.parser.parse(&name, &hint) {
                Ok(result) => result,
                Err(e) => {
                    debug!("Unable to parse anime release {}: {}", name, e);
                    return None;
                }
            };
        }

        let episodes: EpisodeSet = result.episodes.iter().copied().collect();
        if episodes.is_empty() {
            debug!("No episodes found in {}, skipping", name);
            return None;
        }

        Some(CacheEntry {
            source_id: self.source_id().to_string(),
            name,
            season: result.season.unwrap_or(1),
            episodes,
            show_id: result.show.id,
            url,
            fetched_at: self.clock.now().timestamp(),
            quality: result.quality,
            release_group: result.release_group,
            version: result.version,
        })
    }
}

#[async_trait]
impl Action for SourceCache {
    fn name(&self) -> &str {
        &self.task_name
    }

    async fn execute(&self) -> Result<(), ActionError> {
        self.update(&FetchOptions::default()).await;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Whitespace runs become a single `.`.
fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(".")
}

/// Marks the cache active for the lifetime of the guard.
struct ActiveGuard<'a>(&'a AtomicBool);

impl<'a> ActiveGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RawItem, SqliteCacheStore};
    use crate::release::{Quality, SceneNameParser};
    use crate::show::StaticShowDirectory;
    use crate::testing::{fixtures, FailingStore, ManualClock, MockConnector};

    struct Harness {
        cache: SourceCache,
        connector: Arc<MockConnector>,
        store: Arc<SqliteCacheStore>,
        failing: Arc<FailingStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_for(source_id: &str, shows: StaticShowDirectory) -> Harness {
        let connector = Arc::new(MockConnector::new(source_id));
        let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
        let failing = Arc::new(FailingStore::new(store.clone()));
        let shows: Arc<dyn ShowDirectory> = Arc::new(shows);
        let parser = Arc::new(SceneNameParser::new(Arc::clone(&shows)));
        let clock = Arc::new(ManualClock::new(fixtures::base_time()));
        let cache = SourceCache::new(
            connector.clone(),
            failing.clone(),
            parser,
            shows,
            SourceCacheConfig::default(),
            clock.clone(),
        );
        Harness {
            cache,
            connector,
            store,
            failing,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_for("src", fixtures::show_directory())
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Show Name  S01E02 720p"), "Show.Name.S01E02.720p");
        assert_eq!(normalize_title(" Show.Name "), "Show.Name");
    }

    #[test]
    fn test_parse_item() {
        let h = harness();
        let entry = h
            .cache
            .parse_item("Show Name S01E02 720p HDTV-GRP", "http://x/?a=1&amp;b=2", None)
            .unwrap();
        assert_eq!(entry.name, "Show.Name.S01E02.720p.HDTV-GRP");
        assert_eq!(entry.url, "http://x/?a=1&b=2");
        assert_eq!(entry.season, 1);
        assert_eq!(entry.episodes, [2].into_iter().collect());
        assert_eq!(entry.show_id, fixtures::show_name_id());
        assert_eq!(entry.quality, Quality::HdTv);
        assert_eq!(entry.release_group.as_deref(), Some("GRP"));
        assert_eq!(entry.fetched_at, fixtures::base_time().timestamp());
    }

    #[test]
    fn test_parse_item_rejects_garbage() {
        let h = harness();
        assert!(h.cache.parse_item("garbage", "u", None).is_none());
    }

    #[test]
    fn test_parse_item_show_hint() {
        let h = harness();
        // The hint resolves the show even though the title names another one.
        let entry = h
            .cache
            .parse_item("Renamed.Show.S02E05.720p", "u", Some(fixtures::show_name_id()))
            .unwrap();
        assert_eq!(entry.show_id, fixtures::show_name_id());
        assert_eq!(entry.season, 2);
    }

    #[test]
    fn test_parse_item_anime_absolute_defaults_season() {
        let h = harness();
        let entry = h
            .cache
            .parse_item("[Sub] Anime Title - 12v2 [720p]", "u", None)
            .unwrap();
        assert_eq!(entry.show_id, fixtures::anime_id());
        assert_eq!(entry.season, 1);
        assert_eq!(entry.episodes, [12].into_iter().collect());
        assert_eq!(entry.version, 2);
    }

    #[test]
    fn test_parse_item_anime_rereads_absolute_number() {
        let h = harness();
        // scene numbering parses first; the anime pass prefers the absolute number
        let entry = h
            .cache
            .parse_item("Anime Title S01E05 - 13 [720p]", "u", None)
            .unwrap();
        assert_eq!(entry.show_id, fixtures::anime_id());
        assert_eq!(entry.season, 1);
        assert_eq!(entry.episodes, [13].into_iter().collect());
    }

    #[test]
    fn test_parse_item_ambiguous_show_hint_skipped() {
        let h = harness_for(
            "src",
            StaticShowDirectory::new(vec![
                Show::new(fixtures::show_name_id(), "Show Name"),
                Show::new(fixtures::show_name_id(), "Show Name Copy"),
            ]),
        );
        assert!(h
            .cache
            .parse_item("Show.Name.S01E02.720p", "u", Some(fixtures::show_name_id()))
            .is_none());
        assert!(h
            .cache
            .parse_item("Show.Name.S01E02.720p", "u", None)
            .is_some());
    }

    #[tokio::test]
    async fn test_update_parses_and_stores() {
        let h = harness();
        h.connector.set_items(vec![
            RawItem::new("Show.Name.S01E02.720p", "u1"),
            RawItem::new("garbage", "u2"),
            RawItem {
                title: None,
                url: Some("u3".to_string()),
                show_id: None,
            },
        ]);

        let entries = h.cache.update(&FetchOptions::default()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(h.store.count("src").unwrap(), 1);
        assert_eq!(
            h.store.last_refresh("src").unwrap(),
            Some(fixtures::base_time().timestamp())
        );
        assert!(!h.cache.is_active());
    }

    #[tokio::test]
    async fn test_update_skipped_when_fresh() {
        let h = harness();
        h.store
            .set_last_refresh("src", fixtures::base_time().timestamp() - 60)
            .unwrap();
        h.connector
            .set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u1")]);

        let entries = h.cache.update(&FetchOptions::default()).await;
        assert!(entries.is_empty());
        assert_eq!(h.connector.fetch_count(), 0);
        assert_eq!(h.store.count("src").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_empty_fetch_still_stamps() {
        let h = harness();
        let entries = h.cache.update(&FetchOptions::default()).await;
        assert!(entries.is_empty());
        assert_eq!(h.connector.fetch_count(), 1);
        assert_eq!(
            h.store.last_refresh("src").unwrap(),
            Some(fixtures::base_time().timestamp())
        );
    }

    #[tokio::test]
    async fn test_update_fetch_error_still_stamps() {
        let h = harness();
        h.connector.set_fetch_failure(Some("timeout"));
        let entries = h.cache.update(&FetchOptions::default()).await;
        assert!(entries.is_empty());
        assert!(h.store.last_refresh("src").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_auth_failure_mutates_nothing() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "Old.S01E01.720p", 1)])
            .unwrap();
        h.connector.set_auth_failure(true);
        h.connector
            .set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u1")]);

        let entries = h.cache.update(&FetchOptions::default()).await;
        assert!(entries.is_empty());
        assert_eq!(h.connector.fetch_count(), 0);
        assert_eq!(h.store.count("src").unwrap(), 1);
        assert_eq!(h.store.last_refresh("src").unwrap(), None);
    }

    #[tokio::test]
    async fn test_future_timestamps_are_clamped() {
        let h = harness();
        let future = fixtures::base_time().timestamp() + 3_600;
        h.store.set_last_refresh("src", future).unwrap();
        h.store.set_last_consumed("src", future).unwrap();

        let state = h.cache.refresh_state().unwrap();
        assert_eq!(state.last_refresh, clock::epoch());
        assert_eq!(state.last_consumed, clock::epoch());
        assert!(h.cache.should_refresh().unwrap());
    }

    #[tokio::test]
    async fn test_update_passes_options_and_item_show() {
        let h = harness();
        h.connector.set_items(vec![RawItem::new("Renamed.Show.S02E05.720p", "u1")
            .with_show(fixtures::show_name_id())]);
        let options = FetchOptions {
            limit: Some(5),
            ..Default::default()
        };

        let entries = h.cache.update(&options).await;
        assert_eq!(h.connector.last_options(), Some(options));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].show_id, fixtures::show_name_id());
        assert_eq!(entries[0].season, 2);
    }

    #[tokio::test]
    async fn test_update_unreadable_state_is_empty() {
        let h = harness();
        h.connector
            .set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u1")]);
        h.failing.set_fail_timestamps(true);

        assert!(h.cache.update(&FetchOptions::default()).await.is_empty());
        assert_eq!(h.connector.fetch_count(), 0);
        assert_eq!(h.store.count("src").unwrap(), 0);
        assert_eq!(h.store.last_refresh("src").unwrap(), None);
        assert!(!h.cache.is_active());
    }

    #[tokio::test]
    async fn test_update_store_failure_keeps_rows_and_stamps() {
        let h = harness_for("write-fail", fixtures::show_directory());
        let base = fixtures::base_time().timestamp();
        h.store
            .insert_entries(&[fixtures::entry("write-fail", "Show.Name.S01E01.720p", 1)])
            .unwrap();
        h.store.set_last_refresh("write-fail", base - 1_200).unwrap();
        h.store.set_last_consumed("write-fail", base - 300).unwrap();
        assert!(h.cache.should_purge().unwrap());

        h.connector
            .set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u2")]);
        h.failing.set_fail_writes(true);

        let entries = h.cache.update(&FetchOptions::default()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(h.store.count("write-fail").unwrap(), 1);
        assert_eq!(h.store.last_refresh("write-fail").unwrap(), Some(base));
        assert_eq!(
            metrics::CACHE_PURGES
                .with_label_values(&["write-fail"])
                .get(),
            0
        );

        // the next due pass purges for real
        h.failing.set_fail_writes(false);
        h.store.set_last_consumed("write-fail", base).unwrap();
        h.clock.advance(TimeDelta::minutes(10));
        h.cache.update(&FetchOptions::default()).await;
        assert_eq!(h.store.count("write-fail").unwrap(), 1);
        assert_eq!(
            metrics::CACHE_PURGES
                .with_label_values(&["write-fail"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_should_refresh_follows_interval() {
        let h = harness();
        assert!(h.cache.should_refresh().unwrap());

        h.cache.update(&FetchOptions::default()).await;
        assert!(!h.cache.should_refresh().unwrap());

        h.clock.advance(TimeDelta::minutes(10));
        assert!(h.cache.should_refresh().unwrap());
    }

    #[tokio::test]
    async fn test_action_execute_runs_update() {
        let h = harness();
        h.connector
            .set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u1")]);

        assert_eq!(Action::name(&h.cache), "cache:src");
        assert!(h.cache.is_enabled());
        h.cache.execute().await.unwrap();
        assert_eq!(h.store.count("src").unwrap(), 1);
    }
}
