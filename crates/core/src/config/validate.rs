use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::scheduler::MAX_INTERVAL_SECS;

/// Validate configuration
/// Currently validates:
/// - Source ids are non-empty and unique
/// - Refresh interval, cycle time and poll interval are not 0
/// - A start-time window spans at least one hour
/// - Metrics export interval is not 0
/// - Cycle, delay and export intervals stay within `MAX_INTERVAL_SECS`
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.metrics.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "metrics.interval_secs cannot be 0".to_string(),
        ));
    }
    if config.metrics.interval_secs > MAX_INTERVAL_SECS {
        return Err(ConfigError::ValidationError(format!(
            "metrics.interval_secs cannot exceed {}",
            MAX_INTERVAL_SECS
        )));
    }

    let mut seen = HashSet::new();

    for source in &config.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sources.id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate source id: {}",
                source.id
            )));
        }
        if source.refresh_interval_minutes == 0 {
            return Err(ConfigError::ValidationError(format!(
                "sources[{}].refresh_interval_minutes cannot be 0",
                source.id
            )));
        }

        let schedule = &source.schedule;
        if schedule.cycle_time_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "sources[{}].schedule.cycle_time_secs cannot be 0",
                source.id
            )));
        }
        if schedule.cycle_time_secs > MAX_INTERVAL_SECS
            || schedule.run_delay_secs > MAX_INTERVAL_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "sources[{}].schedule intervals cannot exceed {} seconds",
                source.id, MAX_INTERVAL_SECS
            )));
        }
        if schedule.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "sources[{}].schedule.poll_interval_ms cannot be 0",
                source.id
            )));
        }
        // the start window is [start hour, start hour + cycle hours)
        if schedule.start_time.is_some() && schedule.cycle_hours() < 1 {
            return Err(ConfigError::ValidationError(format!(
                "sources[{}].schedule.start_time requires cycle_time_secs >= 3600",
                source.id
            )));
        }
    }

    Ok(())
}
