pub mod cache;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod release;
pub mod scheduler;
pub mod show;
pub mod testing;

pub use cache::{
    CacheEntry, CacheError, CacheStore, ContentHandle, EpisodeKey, EpisodeStatus, FetchOptions,
    MatchResult, MatcherConfig, RawItem, ReleaseMatcher, SourceCache, SourceCacheConfig,
    SourceConnector, SourceError, SqliteCacheStore, WantedUnit,
};
pub use clock::{Clock, SystemClock};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use release::{NameParser, ParseError, Quality, SceneNameParser, WordFilter};
pub use scheduler::{Action, ActionError, Scheduler, SchedulerConfig, SchedulerState};
pub use show::{Show, ShowDirectory, ShowId, StaticShowDirectory};
