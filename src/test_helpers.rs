//! Shared test utilities
//!
//! Provides a recording subscriber and a helper that walks a manual clock
//! through every pending timer deadline.

use crate::clock::ManualClock;
use crate::registry::DeviceRegistry;
use std::cell::RefCell;
use std::rc::Rc;

/// Events captured by a [`recorder`] listener
pub type Recorded<E> = Rc<RefCell<Vec<E>>>;

/// Creates a listener that stores a copy of every event it receives.
pub fn recorder<E: Clone + 'static>() -> (impl FnMut(&E) + 'static, Recorded<E>) {
    let seen: Recorded<E> = Rc::default();
    let sink = seen.clone();
    (move |event: &E| sink.borrow_mut().push(event.clone()), seen)
}

/// Advances `clock` to `until`, stopping at each timer deadline on the way
/// so that repeat and multi-tap timers fire at their scheduled times.
pub fn advance_to(registry: &mut DeviceRegistry, clock: &ManualClock, until: u64) {
    while let Some(due) = registry.next_deadline().filter(|due| *due <= until) {
        clock.set(due);
        registry.poll_timers();
    }
    clock.set(until);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_events_in_order() {
        let (mut listener, seen) = recorder::<u32>();
        listener(&1);
        listener(&2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn advance_to_without_timers_just_moves_the_clock() {
        let clock = ManualClock::new();
        let mut registry =
            DeviceRegistry::new(Rc::new(clock.clone()), Default::default()).unwrap();
        advance_to(&mut registry, &clock, 120);
        assert_eq!(crate::clock::Clock::now_ms(&clock), 120);
    }
}
