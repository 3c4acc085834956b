//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler (runs per task and outcome, run duration)
//! - Ingestion (items seen, refreshes, purges)
//! - Matching (accepted results)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Scheduler
// =============================================================================

/// Scheduled runs by task and result.
pub static SCHEDULER_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sickle_scheduler_runs_total", "Total scheduled task runs"),
        &["task", "result"], // "success", "failed", "skipped"
    )
    .unwrap()
});

/// Scheduled run duration in seconds.
pub static SCHEDULER_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sickle_scheduler_run_duration_seconds",
            "Duration of scheduled task runs",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["task"],
    )
    .unwrap()
});

// =============================================================================
// Ingestion
// =============================================================================

/// Raw items processed by source and result.
pub static CACHE_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sickle_cache_items_total", "Raw items processed by ingestion"),
        &["source", "result"], // "parsed", "skipped"
    )
    .unwrap()
});

/// Refresh passes by source and result.
pub static CACHE_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sickle_cache_refreshes_total", "Cache refresh passes"),
        &["source", "result"], // "refreshed", "auth_failed", "fetch_failed"
    )
    .unwrap()
});

/// Purges of previously stored rows by source.
pub static CACHE_PURGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sickle_cache_purges_total", "Cache purges before insert"),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Matching
// =============================================================================

/// Accepted match results by source.
pub static MATCH_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sickle_match_results_total", "Cached releases accepted by the matcher"),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(SCHEDULER_RUNS.clone()),
        Box::new(SCHEDULER_RUN_DURATION.clone()),
        // Ingestion
        Box::new(CACHE_ITEMS.clone()),
        Box::new(CACHE_REFRESHES.clone()),
        Box::new(CACHE_PURGES.clone()),
        // Matching
        Box::new(MATCH_RESULTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        SCHEDULER_RUNS.with_label_values(&["metrics-test", "success"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "sickle_scheduler_runs_total"));
    }
}
