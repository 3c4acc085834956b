//! Source connector abstraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ContentHandle, WantedUnit};
use crate::show::ShowId;

/// An unparsed item as returned by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Owning show as identified by the source itself.
    #[serde(default, alias = "show", skip_serializing_if = "Option::is_none")]
    pub show_id: Option<ShowId>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            show_id: None,
        }
    }

    pub fn with_show(mut self, show_id: ShowId) -> Self {
        self.show_id = Some(show_id);
        self
    }
}

/// Options forwarded to the connector on fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Upper bound on items to request, when the source supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Source-specific request parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Errors from a source connector.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A data source feeding one cache.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Stable identifier; scopes every persisted row of this source.
    fn source_id(&self) -> &str;

    /// Display name for logging.
    fn name(&self) -> &str;

    /// Whether the source only carries anime.
    fn anime_only(&self) -> bool {
        false
    }

    /// Verify credentials. Fails with `SourceError::Authentication`.
    async fn check_auth(&self) -> Result<(), SourceError>;

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>, SourceError>;

    fn title_and_url(&self, item: &RawItem) -> (Option<String>, Option<String>) {
        (item.title.clone(), item.url.clone())
    }

    /// Build a handle for the content behind `url`.
    fn get_result(&self, _unit: &WantedUnit, url: &str) -> Option<ContentHandle> {
        Some(ContentHandle {
            source_id: self.source_id().to_string(),
            url: url.to_string(),
        })
    }
}
