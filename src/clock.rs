use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Instant,
};

use crate::units::{TimeDelta, Timestamp};

/// A source of [Timestamp]s for the [SessionRegistry](crate::SessionRegistry).
///
/// Everything below the registry takes an explicit `at_time` instead, so a simulation can drive
/// the engine with any notion of time it likes.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic wall clock, anchored at construction.
#[derive(Clone, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.start.elapsed().as_micros() as i64)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_us: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_us: Arc::new(AtomicI64::new(start.us())),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        self.now_us.fetch_add(delta.us(), Ordering::AcqRel);
    }

    pub fn set(&self, at_time: Timestamp) {
        self.now_us.store(at_time.us(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.now_us.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(Timestamp::from_seconds(5));
        let other = clock.clone();
        clock.advance(TimeDelta::from_millis(1500));
        assert_eq!(other.now(), Timestamp::from_millis(6500));

        other.set(Timestamp::from_seconds(100));
        assert_eq!(clock.now(), Timestamp::from_seconds(100));
    }

    #[test]
    fn system_clock_does_not_go_backwards() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
