//! Types for the per-source release cache.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::Quality;
use crate::show::ShowId;

/// Ordered set of episode numbers covered by one release.
///
/// Persisted as a delimited column (`"|1|2|"`) so membership can be tested
/// with a substring predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeSet(BTreeSet<u32>);

impl EpisodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, episode: u32) -> bool {
        self.0.contains(&episode)
    }

    pub fn insert(&mut self, episode: u32) -> bool {
        self.0.insert(episode)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Column encoding: `|1|2|`, or the empty string for an empty set.
    pub fn to_column(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let mut out = String::from("|");
        for ep in &self.0 {
            out.push_str(&ep.to_string());
            out.push('|');
        }
        out
    }

    /// Decode the column encoding. Non-numeric fragments are ignored.
    pub fn from_column(column: &str) -> Self {
        column
            .split('|')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    }

    /// `LIKE` pattern matching rows whose set contains `episode`.
    pub fn like_pattern(episode: u32) -> String {
        format!("%|{}|%", episode)
    }
}

impl FromIterator<u32> for EpisodeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A normalized, persisted release derived from a raw source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_id: String,
    /// Normalized release name.
    pub name: String,
    pub season: u32,
    pub episodes: EpisodeSet,
    pub show_id: ShowId,
    pub url: String,
    /// Epoch seconds when the entry was fetched.
    pub fetched_at: i64,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_group: Option<String>,
    /// `-1` when unknown.
    pub version: i32,
}

/// Refresh/consumption timestamps of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshState {
    pub last_refresh: DateTime<Local>,
    pub last_consumed: DateTime<Local>,
}

impl RefreshState {
    /// Stored rows may only be replaced once they have been read at least
    /// once since they were written.
    pub fn should_purge(&self) -> bool {
        self.last_consumed >= self.last_refresh
    }
}

/// Lookup of cached entries for one wanted episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub source_id: String,
    pub show_id: ShowId,
    pub season: u32,
    pub episode: u32,
    /// Acceptable qualities. Empty matches nothing.
    pub qualities: Vec<Quality>,
}

/// Identity of one episode; results of the matcher are grouped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub show_id: ShowId,
    pub season: u32,
    pub episode: u32,
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} S{:02}E{:02}", self.show_id, self.season, self.episode)
    }
}

/// Library state of a wanted episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Wanted,
    Skipped,
    Ignored,
    Snatched(Quality),
    Downloaded(Quality),
}

/// One episode the caller may want, with its acceptance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedUnit {
    pub show_id: ShowId,
    pub season: u32,
    pub episode: u32,
    pub wanted_quality: Vec<Quality>,
    pub status: EpisodeStatus,
}

impl WantedUnit {
    pub fn new(show_id: ShowId, season: u32, episode: u32, wanted_quality: Vec<Quality>) -> Self {
        Self {
            show_id,
            season,
            episode,
            wanted_quality,
            status: EpisodeStatus::Wanted,
        }
    }

    pub fn with_status(mut self, status: EpisodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn key(&self) -> EpisodeKey {
        EpisodeKey {
            show_id: self.show_id,
            season: self.season,
            episode: self.episode,
        }
    }

    /// Whether a release of `quality` is still wanted for this episode.
    ///
    /// Manual searches also accept skipped/ignored episodes and re-grabs of
    /// episodes already snatched or downloaded.
    pub fn wants(&self, quality: Quality, manual: bool) -> bool {
        if !self.wanted_quality.contains(&quality) {
            return false;
        }
        match self.status {
            EpisodeStatus::Wanted => true,
            EpisodeStatus::Skipped | EpisodeStatus::Ignored => manual,
            EpisodeStatus::Snatched(have) | EpisodeStatus::Downloaded(have) => {
                manual || quality > have
            }
        }
    }
}

/// Reference to fetchable content; the bytes are never loaded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHandle {
    pub source_id: String,
    pub url: String,
}

/// A cached release accepted for a wanted episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub name: String,
    pub url: String,
    pub show_id: ShowId,
    pub season: u32,
    pub episode: u32,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_group: Option<String>,
    pub version: i32,
    pub is_repack: bool,
    pub proper_level: u32,
    pub handle: ContentHandle,
}

/// Errors for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),
}
