use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::{MatcherConfig, SourceCacheConfig};
use crate::release::WordFilter;
use crate::scheduler::SchedulerConfig;
use crate::show::{Show, ShowId, StaticShowDirectory};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Word filter applied when matching cached releases
    #[serde(default)]
    pub matcher: WordFilter,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub shows: Vec<ShowConfig>,
}

impl Config {
    /// Show directory built from the `[[shows]]` entries.
    pub fn show_directory(&self) -> StaticShowDirectory {
        StaticShowDirectory::new(self.shows.iter().map(ShowConfig::to_show).collect())
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            filter: self.matcher.clone(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("sickle.db")
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Metrics export configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus text file rewritten periodically (disabled when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textfile_path: Option<PathBuf>,
    /// Seconds between two exports (default: 60)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            textfile_path: None,
            interval_secs: default_metrics_interval(),
        }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

/// One polled source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Stable identifier; scopes the source's cached rows
    pub id: String,
    /// Display name (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only anime releases are accepted from this source
    #[serde(default)]
    pub anime_only: bool,
    /// Minimum minutes between two refreshes (default: 10)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u32,
    /// JSON feed file read by the file connector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_path: Option<PathBuf>,
    /// Scheduler driving the source's refreshes
    #[serde(default)]
    pub schedule: SchedulerConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_refresh_interval() -> u32 {
    10
}

impl SourceConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn cache_config(&self) -> SourceCacheConfig {
        SourceCacheConfig {
            refresh_interval: TimeDelta::minutes(i64::from(self.refresh_interval_minutes)),
            enabled: self.enabled,
        }
    }
}

/// A show of the local library
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShowConfig {
    pub namespace: u32,
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_anime: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ShowConfig {
    pub fn to_show(&self) -> Show {
        Show {
            id: ShowId::new(self.namespace, self.id),
            name: self.name.clone(),
            is_anime: self.is_anime,
            aliases: self.aliases.clone(),
        }
    }
}
