//! Monotonic millisecond clocks
//!
//! Every timestamp in the pipeline is a count of milliseconds on a [`Clock`].
//! The core never accepts timestamps from input producers; it samples its
//! own clock when a transition arrives or a timer is serviced.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Source of monotonic time in milliseconds
pub trait Clock {
    /// Milliseconds elapsed since the clock's origin
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`], counting from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Settable clock shared between clones
///
/// Used for replays and tests where time must advance deterministically.
///
/// # Example
///
/// ```
/// use button_events::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// handle.advance(15);
/// assert_eq!(clock.now_ms(), 15);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time. Going backwards is ignored.
    pub fn set(&self, ms: u64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }

    /// Move forward by `ms` milliseconds
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        other.set(100);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.set(50);
        clock.set(20);
        assert_eq!(clock.now_ms(), 50);
    }

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now_ms() < 1000);
    }
}
