//! Matching of cached releases against wanted episodes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::{
    CacheEntry, CacheError, CacheStore, EntryQuery, EpisodeKey, MatchResult, SourceConnector,
    WantedUnit,
};
use crate::clock::Clock;
use crate::metrics;
use crate::release::{NameParser, ParseHint, ProperLevel, WordFilter};
use crate::show::{Show, ShowDirectory};

/// Matcher settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Content-sanity filter applied to cached names.
    pub filter: WordFilter,
}

/// Answers "which cached releases satisfy these wanted episodes" for one
/// source.
pub struct ReleaseMatcher {
    connector: Arc<dyn SourceConnector>,
    store: Arc<dyn CacheStore>,
    parser: Arc<dyn NameParser>,
    shows: Arc<dyn ShowDirectory>,
    config: MatcherConfig,
    clock: Arc<dyn Clock>,
}

impl ReleaseMatcher {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        store: Arc<dyn CacheStore>,
        parser: Arc<dyn NameParser>,
        shows: Arc<dyn ShowDirectory>,
        config: MatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connector,
            store,
            parser,
            shows,
            config,
            clock,
        }
    }

    pub fn source_id(&self) -> &str {
        self.connector.source_id()
    }

    /// Find cached releases for each wanted unit.
    ///
    /// Every call records a consumption of the source's cache, including
    /// calls that match nothing and calls whose queries failed. A unit whose
    /// query fails contributes no rows. Each stored release is bound to the
    /// first unit whose query returned it, so a multi-episode release
    /// appears under one key only; units with no accepted release are absent.
    pub fn find_needed(
        &self,
        units: &[WantedUnit],
        manual: bool,
    ) -> BTreeMap<EpisodeKey, Vec<MatchResult>> {
        let mut candidates = Vec::with_capacity(units.len());
        for unit in units {
            let query = EntryQuery {
                source_id: self.source_id().to_string(),
                show_id: unit.show_id,
                season: unit.season,
                episode: unit.episode,
                qualities: unit.wanted_quality.clone(),
            };
            match self.store.find_entries(&query) {
                Ok(rows) => candidates.push((unit, rows)),
                Err(e) => warn!(
                    "Failed to query cache of {} for {}: {}",
                    self.source_id(),
                    unit.key(),
                    e
                ),
            }
        }

        let mut results: BTreeMap<EpisodeKey, Vec<MatchResult>> = BTreeMap::new();
        if candidates.iter().all(|(_, rows)| rows.is_empty()) {
            self.stamp_consumed();
            return results;
        }

        let mut bound = HashSet::new();
        let mut accepted = 0;
        for (unit, rows) in candidates {
            for row in rows {
                if !bound.insert((row.name.clone(), row.url.clone())) {
                    continue;
                }
                if let Some(result) = self.accept(unit, row, manual) {
                    results.entry(unit.key()).or_default().push(result);
                    accepted += 1;
                }
            }
        }

        if accepted > 0 {
            info!(
                "Found {} cached releases on {} for {} wanted episodes",
                accepted,
                self.source_id(),
                units.len()
            );
            metrics::MATCH_RESULTS
                .with_label_values(&[self.source_id()])
                .inc_by(accepted);
        }

        self.stamp_consumed();
        results
    }

    /// Cached releases for a single unit.
    pub fn search_cache(&self, unit: &WantedUnit, manual: bool) -> Vec<MatchResult> {
        self.find_needed(std::slice::from_ref(unit), manual)
            .remove(&unit.key())
            .unwrap_or_default()
    }

    /// Cached proper/repack releases, optionally only those fetched since
    /// `since`.
    pub fn list_propers(
        &self,
        since: Option<DateTime<Local>>,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        self.store
            .list_propers(self.source_id(), since.map(|t| t.timestamp()))
    }

    fn accept(&self, unit: &WantedUnit, row: CacheEntry, manual: bool) -> Option<MatchResult> {
        let show = match self.shows.find_by_id(&row.show_id) {
            Ok(Some(show)) => show,
            Ok(None) => {
                debug!("Show {} of cached {} no longer exists", row.show_id, row.name);
                return None;
            }
            Err(e) => {
                debug!("Skipping cached {}: {}", row.name, e);
                return None;
            }
        };

        if !self.config.filter.passes(&row.name) {
            debug!("Ignoring {} based on ignored/required words", row.name);
            return None;
        }

        if self.connector.anime_only() && !show.is_anime {
            debug!("{} is not an anime, skipping {}", show.name, row.name);
            return None;
        }

        if !unit.wants(row.quality, manual) {
            debug!(
                "Skipping {}: episode {} does not want {}",
                row.name,
                unit.key(),
                row.quality
            );
            return None;
        }

        let proper = self.classify(&row, &show);

        let handle = match self.connector.get_result(unit, &row.url) {
            Some(handle) => handle,
            None => {
                debug!("No result handle for {}", row.name);
                return None;
            }
        };

        Some(MatchResult {
            name: row.name,
            url: row.url,
            show_id: row.show_id,
            season: unit.season,
            episode: unit.episode,
            quality: row.quality,
            release_group: row.release_group,
            version: row.version,
            is_repack: proper.is_repack,
            proper_level: proper.level,
            handle,
        })
    }

    /// Proper level from a fresh parse of the stored name. The stored
    /// version is what callers see; the parsed one only ranks the release.
    fn classify(&self, row: &CacheEntry, show: &Show) -> ProperLevel {
        match self.parser.parse(&row.name, &ParseHint::for_show(show)) {
            Ok(parsed) => ProperLevel::compute(
                parsed.extra_info_no_name().as_deref(),
                parsed.version,
                parsed.is_anime,
            ),
            Err(e) => {
                debug!("Unable to re-parse {}: {}", row.name, e);
                ProperLevel::compute(None, -1, false)
            }
        }
    }

    fn stamp_consumed(&self) {
        let now = self.clock.now().timestamp();
        if let Err(e) = self.store.set_last_consumed(self.source_id(), now) {
            warn!(
                "Failed to record cache consumption for {}: {}",
                self.source_id(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ContentHandle, EpisodeStatus, SqliteCacheStore};
    use crate::release::{Quality, SceneNameParser};
    use crate::show::ShowId;
    use crate::testing::{fixtures, FailingStore, ManualClock, MockConnector};

    struct Harness {
        matcher: ReleaseMatcher,
        store: Arc<SqliteCacheStore>,
        failing: Arc<FailingStore>,
    }

    fn harness_with(connector: MockConnector, config: MatcherConfig) -> Harness {
        let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
        let failing = Arc::new(FailingStore::new(store.clone()));
        let shows: Arc<dyn ShowDirectory> = Arc::new(fixtures::show_directory());
        let parser = Arc::new(SceneNameParser::new(Arc::clone(&shows)));
        let matcher = ReleaseMatcher::new(
            Arc::new(connector),
            failing.clone(),
            parser,
            shows,
            config,
            Arc::new(ManualClock::new(fixtures::base_time())),
        );
        Harness {
            matcher,
            store,
            failing,
        }
    }

    fn harness() -> Harness {
        harness_with(MockConnector::new("src"), MatcherConfig::default())
    }

    fn wanted(episode: u32) -> WantedUnit {
        WantedUnit::new(fixtures::show_name_id(), 1, episode, vec![Quality::HdTv])
    }

    #[test]
    fn test_multi_episode_entry_matches_unit() {
        let h = harness();
        let mut entry = fixtures::entry("src", "Show.Name.S01E02E03.720p.HDTV-GRP", 2);
        entry.episodes = [2, 3].into_iter().collect();
        h.store.insert_entries(&[entry]).unwrap();

        let results = h.matcher.find_needed(&[wanted(2)], false);
        let matches = &results[&wanted(2).key()];
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Show.Name.S01E02E03.720p.HDTV-GRP");
        assert_eq!(matches[0].episode, 2);
        assert_eq!(
            matches[0].handle,
            ContentHandle {
                source_id: "src".to_string(),
                url: "https://example.org/Show.Name.S01E02E03.720p.HDTV-GRP".to_string(),
            }
        );
    }

    #[test]
    fn test_multi_episode_row_bound_to_first_unit() {
        let h = harness();
        let mut both = fixtures::entry("src", "Show.Name.S01E02E03.720p", 2);
        both.episodes = [2, 3].into_iter().collect();
        h.store
            .insert_entries(&[both, fixtures::entry("src", "Show.Name.S01E03.720p", 3)])
            .unwrap();

        let results = h.matcher.find_needed(&[wanted(2), wanted(3)], false);
        let names = |unit: WantedUnit| -> Vec<String> {
            results[&unit.key()].iter().map(|r| r.name.clone()).collect()
        };
        assert_eq!(names(wanted(2)), vec!["Show.Name.S01E02E03.720p"]);
        assert_eq!(names(wanted(3)), vec!["Show.Name.S01E03.720p"]);
    }

    #[test]
    fn test_query_failure_still_stamps_consumption() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "Show.Name.S01E02.720p", 2)])
            .unwrap();
        h.failing.set_fail_queries(true);

        let results = h.matcher.find_needed(&[wanted(2)], false);
        assert!(results.is_empty());
        assert_eq!(
            h.store.last_consumed("src").unwrap(),
            Some(fixtures::base_time().timestamp())
        );

        h.failing.set_fail_queries(false);
        assert_eq!(h.matcher.search_cache(&wanted(2), false).len(), 1);
    }

    #[test]
    fn test_zero_rows_still_stamps_consumption() {
        let h = harness();
        let results = h.matcher.find_needed(&[wanted(9)], false);
        assert!(results.is_empty());
        assert_eq!(
            h.store.last_consumed("src").unwrap(),
            Some(fixtures::base_time().timestamp())
        );
    }

    #[test]
    fn test_unknown_show_rows_are_dropped() {
        let h = harness();
        let mut orphan = fixtures::entry("src", "Gone.Show.S01E02.720p", 2);
        orphan.show_id = ShowId::new(1, 999);
        h.store.insert_entries(&[orphan]).unwrap();

        let unit = WantedUnit::new(ShowId::new(1, 999), 1, 2, vec![Quality::HdTv]);
        assert!(h.matcher.find_needed(&[unit], false).is_empty());
        assert!(h.store.last_consumed("src").unwrap().is_some());
    }

    #[test]
    fn test_word_filter_rejects() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "Show.Name.S01E02.GERMAN.720p", 2)])
            .unwrap();
        assert!(h.matcher.find_needed(&[wanted(2)], false).is_empty());
    }

    #[test]
    fn test_anime_only_source_rejects_regular_shows() {
        let h = harness_with(
            MockConnector::new("src").anime_only(),
            MatcherConfig::default(),
        );
        h.store
            .insert_entries(&[fixtures::entry("src", "Show.Name.S01E02.720p", 2)])
            .unwrap();
        assert!(h.matcher.find_needed(&[wanted(2)], false).is_empty());
    }

    #[test]
    fn test_manual_relaxes_status() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "Show.Name.S01E02.720p", 2)])
            .unwrap();
        let unit = wanted(2).with_status(EpisodeStatus::Downloaded(Quality::HdTv));

        assert!(h.matcher.find_needed(std::slice::from_ref(&unit), false).is_empty());
        assert_eq!(h.matcher.search_cache(&unit, true).len(), 1);
    }

    #[test]
    fn test_proper_classification() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "Show.Name.S01E02.REPACK.720p-GRP", 2)])
            .unwrap();

        let results = h.matcher.search_cache(&wanted(2), false);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_repack);
        assert_eq!(results[0].proper_level, 1);
    }

    #[test]
    fn test_unparseable_name_falls_back() {
        let h = harness();
        h.store
            .insert_entries(&[fixtures::entry("src", "oddly named REPACK release", 2)])
            .unwrap();

        let results = h.matcher.search_cache(&wanted(2), false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].proper_level, 0);
        assert!(!results[0].is_repack);
    }

    #[test]
    fn test_stored_version_reported_parsed_version_ranks() {
        let h = harness();
        let mut entry = fixtures::entry("src", "[Sub] Anime Title - 12v3 [720p]", 12);
        entry.show_id = fixtures::anime_id();
        entry.version = 2;
        h.store.insert_entries(&[entry]).unwrap();

        let unit = WantedUnit::new(fixtures::anime_id(), 1, 12, vec![Quality::HdTv]);
        let results = h.matcher.search_cache(&unit, false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].version, 2);
        assert_eq!(results[0].proper_level, 2);

        let mut odd = fixtures::entry("src", "oddly named release", 3);
        odd.version = 4;
        h.store.insert_entries(&[odd]).unwrap();
        let results = h.matcher.search_cache(&wanted(3), false);
        assert_eq!(results[0].version, 4);
        assert_eq!(results[0].proper_level, 0);
    }

    #[test]
    fn test_list_propers_passthrough() {
        let h = harness();
        h.store
            .insert_entries(&[
                fixtures::entry("src", "Show.Name.S01E02.PROPER.720p", 2),
                fixtures::entry("src", "Show.Name.S01E03.720p", 3),
            ])
            .unwrap();
        let propers = h.matcher.list_propers(None).unwrap();
        assert_eq!(propers.len(), 1);
        assert!(h.store.last_consumed("src").unwrap().is_none());
    }
}
