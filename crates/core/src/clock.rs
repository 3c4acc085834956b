//! Clock abstraction for testable wall-clock handling.
//!
//! Scheduling decisions (cycle elapsed, start-hour windows) and the cache's
//! refresh/consumption timestamps all read time through a [`Clock`] so tests
//! can pin the current time.

use chrono::{DateTime, Local, TimeZone, Utc};

/// A clock that provides the current local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Convert epoch seconds read from the store into local time.
///
/// Values that cannot be represented fall back to the epoch.
pub fn from_epoch(secs: i64) -> DateTime<Local> {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(epoch)
}

/// The Unix epoch in local time.
pub fn epoch() -> DateTime<Local> {
    DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_epoch_round_trips_seconds() {
        let t = from_epoch(1_700_000_000);
        assert_eq!(t.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_epoch_is_zero() {
        assert_eq!(epoch().timestamp(), 0);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
