//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the scheduler and cache seams, allowing
//! the full refresh/match cycle to be tested without real sources or
//! wall-clock waits.
//!
//! # Example
//!
//! ```rust,ignore
//! use sickle_core::testing::{fixtures, ManualClock, MockConnector};
//!
//! let connector = MockConnector::new("src");
//! connector.set_items(vec![RawItem::new("Show.Name.S01E02.720p", "u1")]);
//!
//! let clock = ManualClock::new(fixtures::base_time());
//! clock.advance(TimeDelta::minutes(10));
//! ```

mod failing_store;
mod manual_clock;
mod mock_action;
mod mock_connector;

pub use failing_store::FailingStore;
pub use manual_clock::ManualClock;
pub use mock_action::MockAction;
pub use mock_connector::MockConnector;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Local, TimeZone};

    use crate::cache::CacheEntry;
    use crate::release::Quality;
    use crate::show::{Show, ShowId, StaticShowDirectory};

    /// A fixed local time: 2026-01-15 12:00:00.
    pub fn base_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
            .single()
            .unwrap_or_else(crate::clock::epoch)
    }

    /// Id of the regular fixture show "Show Name".
    pub fn show_name_id() -> ShowId {
        ShowId::new(1, 100)
    }

    /// Id of the anime fixture show "Anime Title".
    pub fn anime_id() -> ShowId {
        ShowId::new(1, 200)
    }

    /// Directory with one regular and one anime show.
    pub fn show_directory() -> StaticShowDirectory {
        StaticShowDirectory::new(vec![
            Show::new(show_name_id(), "Show Name"),
            Show::new(anime_id(), "Anime Title").anime(),
        ])
    }

    /// A 720p HDTV season-1 entry of "Show Name" for one episode.
    pub fn entry(source_id: &str, name: &str, episode: u32) -> CacheEntry {
        CacheEntry {
            source_id: source_id.to_string(),
            name: name.to_string(),
            season: 1,
            episodes: [episode].into_iter().collect(),
            show_id: show_name_id(),
            url: format!("https://example.org/{}", name),
            fetched_at: base_time().timestamp(),
            quality: Quality::HdTv,
            release_group: None,
            version: -1,
        }
    }
}
