//! sickle daemon: one scheduled refresh worker per configured source.

mod feed;
mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sickle_core::config::LoggingConfig;
use sickle_core::{
    load_config, validate_config, CacheStore, Clock, Config, NameParser, SceneNameParser,
    Scheduler, SchedulerConfig, ShowDirectory, SourceCache, SqliteCacheStore, SystemClock,
};

use crate::feed::FileFeedConnector;
use crate::metrics::MetricsExport;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // logging may not be initialized yet
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("SICKLE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.logging);
    info!("Loaded configuration from {}", config_path.display());

    validate_config(&config).context("Configuration validation failed")?;

    let workers = start_workers(&config)?;
    if workers.is_empty() {
        warn!("No workers configured; waiting for shutdown");
    } else {
        info!("Started {} workers", workers.len());
    }

    shutdown_signal().await;
    info!("Shutdown signal received, stopping {} workers", workers.len());

    // stop everything first so workers wind down concurrently
    for (scheduler, _) in &workers {
        scheduler.stop();
    }
    for (scheduler, handle) in workers {
        scheduler.shutdown(handle, SHUTDOWN_TIMEOUT).await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn start_workers(config: &Config) -> Result<Vec<(Arc<Scheduler>, JoinHandle<()>)>> {
    let store: Arc<dyn CacheStore> = Arc::new(
        SqliteCacheStore::new(&config.database.path).with_context(|| {
            format!(
                "Failed to open cache database {}",
                config.database.path.display()
            )
        })?,
    );
    let shows: Arc<dyn ShowDirectory> = Arc::new(config.show_directory());
    let parser: Arc<dyn NameParser> = Arc::new(SceneNameParser::new(Arc::clone(&shows)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    info!(
        "Cache database at {}, {} shows known",
        config.database.path.display(),
        config.shows.len()
    );

    let mut workers = Vec::new();

    for source in &config.sources {
        let Some(connector) = FileFeedConnector::from_config(source) else {
            warn!("Source {} has no feed_path configured, skipping", source.id);
            continue;
        };

        let cache = Arc::new(SourceCache::new(
            Arc::new(connector),
            Arc::clone(&store),
            Arc::clone(&parser),
            Arc::clone(&shows),
            source.cache_config(),
            Arc::clone(&clock),
        ));

        let scheduler = Arc::new(Scheduler::new(
            format!("cache:{}", source.id),
            cache,
            source.schedule.clone(),
            Arc::clone(&clock),
        ));
        info!(
            "Starting source {} ({}), cycle {}s",
            source.id,
            source.display_name(),
            source.schedule.cycle_time_secs
        );
        let handle = scheduler.spawn();
        workers.push((scheduler, handle));
    }

    if let Some(path) = &config.metrics.textfile_path {
        let export = Arc::new(MetricsExport::new(path, metrics::REGISTRY.clone()));
        info!("Exporting metrics to {}", export.path().display());

        let scheduler = Arc::new(Scheduler::new(
            "metrics-export",
            export,
            SchedulerConfig::every(Duration::from_secs(config.metrics.interval_secs)),
            Arc::clone(&clock),
        ));
        let handle = scheduler.spawn();
        workers.push((scheduler, handle));
    }

    Ok(workers)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
