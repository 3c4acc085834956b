//! Prometheus text export.
//!
//! The daemon has no HTTP surface, so the registry is written to a file in
//! the text exposition format (node_exporter textfile collector layout) by a
//! scheduled action.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, warn};

use sickle_core::{Action, ActionError};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for metric in sickle_core::metrics::all_metrics() {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Periodically rewrites a textfile with the current registry contents.
pub struct MetricsExport {
    path: PathBuf,
    registry: Registry,
}

impl MetricsExport {
    pub fn new(path: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Action for MetricsExport {
    fn name(&self) -> &str {
        "metrics-export"
    }

    async fn execute(&self) -> Result<(), ActionError> {
        let text = encode_metrics(&self.registry)
            .map_err(|e| ActionError::Failed(format!("encode metrics: {}", e)))?;

        // readers must never observe a half-written file
        let tmp = self.path.with_extension("prom.tmp");
        tokio::fs::write(&tmp, text.as_bytes())
            .await
            .map_err(|e| ActionError::Failed(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ActionError::Failed(format!("rename {}: {}", tmp.display(), e)))?;

        debug!("Wrote {} bytes of metrics to {}", text.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sickle_core::metrics::CACHE_REFRESHES;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_writes_text_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sickle.prom");

        let registry = Registry::new();
        register_metrics(&registry);
        CACHE_REFRESHES
            .with_label_values(&["export-test", "success"])
            .inc();

        let export = MetricsExport::new(&path, registry);
        export.execute().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("sickle_cache_refreshes_total"));
        assert!(text.contains("export-test"));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[tokio::test]
    async fn test_export_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let export = MetricsExport::new(
            temp_dir.path().join("missing").join("sickle.prom"),
            Registry::new(),
        );

        assert!(matches!(
            export.execute().await,
            Err(ActionError::Failed(_))
        ));
    }
}
