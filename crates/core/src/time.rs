//! Time providers for transaction start timestamps

use crate::traits::TimeProvider;
use crate::types::Timestamp;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock milliseconds since the Unix epoch
///
/// The wall clock can step backwards (NTP adjustments); readings are clamped
/// so that this provider never returns less than it returned before.
#[derive(Debug, Default)]
pub struct SystemTimeProvider {
    last: AtomicU64,
}

impl SystemTimeProvider {
    /// Create a new system clock
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Timestamp {
        let wall = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self.last.fetch_max(wall, Ordering::AcqRel);
        previous.max(wall)
    }
}

/// A clock that only moves when told to
///
/// Useful for tests and for scenarios that need exact control over which
/// transaction is older.
///
/// # Examples
///
/// ```
/// use txnguard_core::{ManualTimeProvider, TimeProvider};
///
/// let clock = ManualTimeProvider::new(5);
/// assert_eq!(clock.now(), 5);
/// clock.advance(2);
/// assert_eq!(clock.now(), 7);
/// ```
#[derive(Debug, Default)]
pub struct ManualTimeProvider {
    now: AtomicU64,
}

impl ManualTimeProvider {
    /// Create a clock reading `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Set the clock
    ///
    /// Moving the clock backwards is allowed here; keeping it non-decreasing
    /// is the caller's business.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::Release);
    }

    /// Move the clock forward by `delta`, returning the new reading
    pub fn advance(&self, delta: Timestamp) -> Timestamp {
        self.now.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::Acquire)
    }
}
