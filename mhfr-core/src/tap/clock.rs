//! Time sources for the recording tap
//!
//! - `SystemClock`: wall-clock UTC nanoseconds
//! - `ManualClock`: for tests, advances only when told to (or by a fixed
//!   step per reading)

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;

/// Source of capture timestamps in nanoseconds since the Unix epoch
pub trait Clock: Send + Sync {
    /// Current time
    fn now_ns(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        // Out of range only after the year 2262
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
    step: i64,
}

impl ManualClock {
    /// Clock frozen at `start_ns`
    pub fn new(start_ns: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ns),
            step: 0,
        }
    }

    /// Clock that advances by `step` after every reading
    pub fn stepping(start_ns: i64, step: Duration) -> Self {
        Self {
            now: AtomicI64::new(start_ns),
            step: step.as_nanos() as i64,
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now_ns: i64) {
        self.now.store(now_ns, Ordering::SeqCst);
    }

    /// Move forward
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_nanos() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ns(), 1_000);
        assert_eq!(clock.now_ns(), 1_000);

        clock.advance(Duration::from_micros(2));
        assert_eq!(clock.now_ns(), 3_000);

        clock.set(50);
        assert_eq!(clock.now_ns(), 50);
    }

    #[test]
    fn test_stepping_clock() {
        let clock = ManualClock::stepping(0, Duration::from_millis(1));
        assert_eq!(clock.now_ns(), 0);
        assert_eq!(clock.now_ns(), 1_000_000);
        assert_eq!(clock.now_ns(), 2_000_000);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_ns() > 1_577_836_800_000_000_000);
    }
}
