use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::error::TypeError;

/// UTC instant used for poll windows and block timestamps.
pub type Timestamp = DateTime<Utc>;

/// Source of the current instant.
///
/// Every instant handed out is truncated to microsecond precision, the same
/// precision the block hash encoding pins, so a stored timestamp always
/// re-encodes to the bytes that were hashed.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        truncate_micros(Utc::now())
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: RwLock::new(truncate_micros(start)),
        }
    }

    /// Move the clock to an absolute instant (may go backwards).
    pub fn set(&self, instant: Timestamp) {
        if let Ok(mut current) = self.current.write() {
            *current = truncate_micros(instant);
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut current) = self.current.write() {
            *current = truncate_micros(*current + delta);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.current
            .read()
            .map(|t| *t)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Drop sub-microsecond precision.
pub fn truncate_micros(instant: Timestamp) -> Timestamp {
    DateTime::from_timestamp_micros(instant.timestamp_micros()).unwrap_or(instant)
}

/// Rebuild an instant from microseconds since the UNIX epoch.
pub fn from_micros(micros: i64) -> Result<Timestamp, TypeError> {
    DateTime::from_timestamp_micros(micros).ok_or(TypeError::TimestampOutOfRange(micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_has_no_sub_micro_component() {
        let now = SystemClock.now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn manual_clock_advances_and_rewinds() {
        let start = from_micros(1_700_000_000_000_000).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn truncation_is_idempotent() {
        let t = from_micros(1_234_567).unwrap() + Duration::nanoseconds(999);
        let once = truncate_micros(t);
        assert_eq!(once, truncate_micros(once));
        assert_eq!(once.timestamp_micros(), 1_234_567);
    }
}
