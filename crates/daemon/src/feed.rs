//! Connector reading a source's items from a local JSON feed file.
//!
//! The file holds an array of `{"title", "url", "show"?}` objects and is
//! typically rewritten by an external fetcher.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use sickle_core::config::SourceConfig;
use sickle_core::{FetchOptions, RawItem, SourceConnector, SourceError};

pub struct FileFeedConnector {
    source_id: String,
    name: String,
    anime_only: bool,
    path: PathBuf,
}

impl FileFeedConnector {
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        anime_only: bool,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            anime_only,
            path: path.into(),
        }
    }

    /// `None` when the source has no `feed_path`.
    pub fn from_config(source: &SourceConfig) -> Option<Self> {
        let path = source.feed_path.as_ref()?;
        Some(Self::new(
            source.id.clone(),
            source.display_name(),
            source.anime_only,
            path.clone(),
        ))
    }
}

#[async_trait]
impl SourceConnector for FileFeedConnector {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn anime_only(&self) -> bool {
        self.anime_only
    }

    /// A feed we are not allowed to read is treated as an auth failure.
    /// A missing file is not: the fetcher may simply not have run yet.
    async fn check_auth(&self) -> Result<(), SourceError> {
        match tokio::fs::metadata(&self.path).await {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(
                SourceError::Authentication(format!("{}: {}", self.path.display(), e)),
            ),
            _ => Ok(()),
        }
    }

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>, SourceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Feed {} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SourceError::Fetch(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut items: Vec<RawItem> = serde_json::from_str(&content).map_err(|e| {
            SourceError::InvalidResponse(format!("{}: {}", self.path.display(), e))
        })?;

        if let Some(limit) = options.limit {
            items.truncate(limit);
        }

        debug!(
            "Read {} items from {} for {}",
            items.len(),
            self.path.display(),
            self.source_id
        );
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sickle_core::ShowId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn feed(content: &str) -> (NamedTempFile, FileFeedConnector) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let connector = FileFeedConnector::new("feed", "Feed", false, file.path());
        (file, connector)
    }

    #[tokio::test]
    async fn test_fetch_items() {
        let (_file, connector) = feed(
            r#"[
                {"title": "Show.Name.S01E01.720p", "url": "u1"},
                {"title": "Show.Name.S01E02.720p", "url": "u2", "show": {"namespace": 1, "id": 100}}
            ]"#,
        );

        connector.check_auth().await.unwrap();
        let items = connector.fetch_items(&FetchOptions::default()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], RawItem::new("Show.Name.S01E01.720p", "u1"));
        assert_eq!(items[1].show_id, Some(ShowId::new(1, 100)));
    }

    #[tokio::test]
    async fn test_fetch_respects_limit() {
        let (_file, connector) = feed(r#"[{"title": "a"}, {"title": "b"}, {"title": "c"}]"#);
        let options = FetchOptions {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(connector.fetch_items(&options).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_or_empty_feed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FileFeedConnector::new("feed", "Feed", false, dir.path().join("none.json"));
        connector.check_auth().await.unwrap();
        assert!(connector
            .fetch_items(&FetchOptions::default())
            .await
            .unwrap()
            .is_empty());

        let (_file, connector) = feed("  \n");
        assert!(connector
            .fetch_items(&FetchOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_is_invalid_response() {
        let (_file, connector) = feed("{not json");
        let result = connector.fetch_items(&FetchOptions::default()).await;
        assert!(matches!(result, Err(SourceError::InvalidResponse(_))));
    }

    #[test]
    fn test_from_config() {
        let config: sickle_core::Config = sickle_core::load_config_from_str(
            r#"
[[sources]]
id = "anime"
name = "Anime Feed"
anime_only = true
feed_path = "/tmp/anime.json"

[[sources]]
id = "no-feed"
"#,
        )
        .unwrap();

        let connector = FileFeedConnector::from_config(&config.sources[0]).unwrap();
        assert_eq!(connector.source_id(), "anime");
        assert_eq!(connector.name(), "Anime Feed");
        assert!(connector.anime_only());
        assert!(FileFeedConnector::from_config(&config.sources[1]).is_none());
    }
}
