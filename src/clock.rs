//! Monotonic time sources for the tick loop and training scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic time source for tests and offline runs.
///
/// Time only moves when `advance` is called, so debounce windows can be
/// crossed without sleeping.
pub struct ManualClock {
    start: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        self.start + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_on_advance() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::from_millis(25));
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(25));
    }

    #[test]
    fn test_manual_clock_keeps_sub_millisecond_steps() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        for _ in 0..4 {
            clock.advance(Duration::from_micros(250));
        }
        clock.advance(Duration::from_nanos(7));
        assert_eq!(
            clock.now().duration_since(t0),
            Duration::from_millis(1) + Duration::from_nanos(7)
        );
    }

    #[test]
    fn test_system_time_source_is_monotonic() {
        let clock = SystemTimeSource::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
