//! Multi-tap (double/triple tap) detection

use super::ButtonStateExtension;
use crate::buttons::{ButtonCode, ButtonState};
use crate::config::MultiTapConfig;
use crate::error::InputError;
use crate::eventbus::EventBus;
use crate::registry::DeviceId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// A completed burst of taps on one button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MultiTapEvent<B> {
    pub device: DeviceId,
    pub button: B,
    /// 1 for a single tap, 2 for a double tap, and so on
    pub tap_count: u16,
    /// Clock time of emission
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Default)]
struct ButtonData {
    state: ButtonState,
    tap_counter: u16,
    last_down: u64,
}

/// Collapses bursts of presses into a single [`MultiTapEvent`]
///
/// Every down edge adds a tap. A burst ends when the window passes without
/// another down edge, or immediately when the tap count reaches `max_taps`.
/// Release edges only update the stored state.
pub struct MultiTapExtension<B: ButtonCode> {
    device: DeviceId,
    window: u64,
    max_taps: u16,
    buttons: HashMap<B, ButtonData>,
    /// Buttons with an open burst
    pending: BTreeSet<B>,
    events: EventBus<MultiTapEvent<B>>,
}

impl<B: ButtonCode> MultiTapExtension<B> {
    pub fn new(device: DeviceId, config: &MultiTapConfig) -> Result<Self, InputError> {
        check_max_taps(config.max_taps)?;
        Ok(Self {
            device,
            window: config.multi_press_window_ms,
            max_taps: config.max_taps,
            buttons: HashMap::new(),
            pending: BTreeSet::new(),
            events: EventBus::new(),
        })
    }

    pub fn id(&self) -> DeviceId {
        self.device
    }

    pub fn max_taps(&self) -> u16 {
        self.max_taps
    }

    /// Change the burst cap. Open bursts keep counting toward the new cap.
    pub fn set_max_taps(&mut self, max_taps: u16) -> Result<(), InputError> {
        check_max_taps(max_taps)?;
        self.max_taps = max_taps;
        Ok(())
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// Subscribers for this extension's events
    pub fn events_mut(&mut self) -> &mut EventBus<MultiTapEvent<B>> {
        &mut self.events
    }

    /// Buttons whose burst is still waiting for its window to close
    pub fn pending(&self) -> impl Iterator<Item = B> + '_ {
        self.pending.iter().copied()
    }

    fn make_event(&self, button: B, tap_count: u16, now: u64) -> MultiTapEvent<B> {
        MultiTapEvent {
            device: self.device,
            button,
            tap_count: tap_count.min(self.max_taps),
            timestamp_ms: now,
        }
    }

    fn emit(&mut self, events: Vec<MultiTapEvent<B>>) {
        for event in events {
            log::trace!("{} tapped {} time(s)", event.button, event.tap_count);
            self.events.emit(&event);
        }
    }
}

fn check_max_taps(max_taps: u16) -> Result<(), InputError> {
    if max_taps == 0 {
        return Err(InputError::InvalidConfig(
            "max_taps must be at least 1".to_string(),
        ));
    }
    Ok(())
}

impl<B: ButtonCode> ButtonStateExtension<B> for MultiTapExtension<B> {
    fn name(&self) -> &'static str {
        "multi-tap"
    }

    fn on_button_transition(&mut self, button: B, _old: ButtonState, new: ButtonState, now: u64) {
        let mut data = self.buttons.get(&button).cloned().unwrap_or_default();
        if data.state == new || new == ButtonState::NotSet {
            return;
        }

        let mut events = Vec::new();
        if data.state == ButtonState::Up && new == ButtonState::Down {
            // The window already closed but the timer has not been serviced
            if data.tap_counter > 0 && now.saturating_sub(data.last_down) >= self.window {
                events.push(self.make_event(button, data.tap_counter, now));
                data.tap_counter = 0;
                self.pending.remove(&button);
            }

            data.tap_counter = data.tap_counter.saturating_add(1);
            data.last_down = now;

            if data.tap_counter >= self.max_taps {
                events.push(self.make_event(button, data.tap_counter, now));
                data.tap_counter = 0;
                self.pending.remove(&button);
            } else {
                self.pending.insert(button);
            }
        }

        data.state = new;
        self.buttons.insert(button, data);
        self.emit(events);
    }

    fn next_deadline(&self) -> Option<u64> {
        self.pending
            .iter()
            .filter_map(|button| self.buttons.get(button))
            .map(|data| data.last_down.saturating_add(self.window))
            .min()
    }

    fn on_timer(&mut self, now: u64) {
        let mut events = Vec::new();
        let mut completed = Vec::new();

        for button in self.pending.iter() {
            let Some(data) = self.buttons.get_mut(button) else {
                completed.push(*button);
                continue;
            };
            if now.saturating_sub(data.last_down) >= self.window {
                events.push(MultiTapEvent {
                    device: self.device,
                    button: *button,
                    tap_count: data.tap_counter.min(self.max_taps),
                    timestamp_ms: now,
                });
                data.tap_counter = 0;
                completed.push(*button);
            }
        }

        for button in completed {
            self.pending.remove(&button);
        }
        self.emit(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::{HidButton, KeyCode};
    use crate::test_helpers::{recorder, Recorded};

    const A: KeyCode = KeyCode(30);
    const S: KeyCode = KeyCode(31);

    fn extension(
        window: u64,
        max_taps: u16,
    ) -> (MultiTapExtension<KeyCode>, Recorded<MultiTapEvent<KeyCode>>) {
        let config = MultiTapConfig {
            multi_press_window_ms: window,
            max_taps,
        };
        let mut ext = MultiTapExtension::new(1, &config).unwrap();
        let (listener, seen) = recorder();
        ext.events_mut().subscribe(listener);
        (ext, seen)
    }

    fn tap<B: ButtonCode>(ext: &mut MultiTapExtension<B>, button: B, at: u64) {
        ext.on_button_transition(button, ButtonState::Up, ButtonState::Down, at);
        ext.on_button_transition(button, ButtonState::Down, ButtonState::Up, at + 20);
    }

    fn run_timers<B: ButtonCode>(ext: &mut MultiTapExtension<B>, until: u64) {
        while let Some(due) = ext.next_deadline().filter(|due| *due <= until) {
            ext.on_timer(due);
        }
    }

    fn taps(seen: &Recorded<MultiTapEvent<KeyCode>>) -> Vec<(u16, u16, u64)> {
        seen.borrow()
            .iter()
            .map(|e| (e.button.0, e.tap_count, e.timestamp_ms))
            .collect()
    }

    #[test]
    fn triple_tap_emits_once_at_cap() {
        let (mut ext, seen) = extension(250, 3);
        tap(&mut ext, A, 0);
        tap(&mut ext, A, 100);
        assert!(seen.borrow().is_empty());
        tap(&mut ext, A, 200);

        assert_eq!(taps(&seen), vec![(30, 3, 200)]);
        assert_eq!(ext.next_deadline(), None);

        run_timers(&mut ext, 1000);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn double_tap_waits_for_window() {
        let (mut ext, seen) = extension(250, 3);
        tap(&mut ext, A, 0);
        tap(&mut ext, A, 100);
        assert_eq!(ext.next_deadline(), Some(350));

        run_timers(&mut ext, 349);
        assert!(seen.borrow().is_empty());

        run_timers(&mut ext, 400);
        assert_eq!(taps(&seen), vec![(30, 2, 350)]);
        assert_eq!(ext.pending().count(), 0);
    }

    #[test]
    fn single_tap_reports_one() {
        let (mut ext, seen) = extension(250, 3);
        tap(&mut ext, A, 0);
        run_timers(&mut ext, 250);
        assert_eq!(taps(&seen), vec![(30, 1, 250)]);
    }

    #[test]
    fn press_exactly_one_window_later_starts_new_burst() {
        let (mut ext, seen) = extension(250, 3);
        tap(&mut ext, A, 0);
        // Timer not serviced; the next press lands exactly on the deadline
        tap(&mut ext, A, 250);

        assert_eq!(taps(&seen), vec![(30, 1, 250)]);
        run_timers(&mut ext, 1000);
        assert_eq!(taps(&seen), vec![(30, 1, 250), (30, 1, 500)]);
    }

    #[test]
    fn release_edges_do_not_count() {
        let (mut ext, seen) = extension(250, 2);
        ext.on_button_transition(A, ButtonState::Up, ButtonState::Down, 0);
        ext.on_button_transition(A, ButtonState::Down, ButtonState::Up, 10);
        ext.on_button_transition(A, ButtonState::Up, ButtonState::Up, 20);
        assert!(seen.borrow().is_empty());
        assert_eq!(ext.pending().collect::<Vec<_>>(), vec![A]);
    }

    #[test]
    fn timer_targets_nearest_deadline_across_buttons() {
        let (mut ext, seen) = extension(250, 4);
        tap(&mut ext, A, 0);
        tap(&mut ext, S, 100);
        assert_eq!(ext.next_deadline(), Some(250));

        run_timers(&mut ext, 250);
        assert_eq!(taps(&seen), vec![(30, 1, 250)]);
        assert_eq!(ext.next_deadline(), Some(350));

        tap(&mut ext, S, 300);
        assert_eq!(ext.next_deadline(), Some(550));
        run_timers(&mut ext, 600);
        assert_eq!(taps(&seen), vec![(30, 1, 250), (31, 2, 550)]);
    }

    #[test]
    fn max_taps_of_one_emits_every_press() {
        let config = MultiTapConfig {
            multi_press_window_ms: 250,
            max_taps: 1,
        };
        let mut ext: MultiTapExtension<HidButton> = MultiTapExtension::new(3, &config).unwrap();
        let (listener, seen) = recorder();
        ext.events_mut().subscribe(listener);

        tap(&mut ext, HidButton(5), 0);
        tap(&mut ext, HidButton(5), 50);

        let counts: Vec<_> = seen
            .borrow()
            .iter()
            .map(|e| (e.device, e.tap_count))
            .collect();
        assert_eq!(counts, vec![(3, 1), (3, 1)]);
        assert_eq!(ext.next_deadline(), None);
    }

    #[test]
    fn burst_never_exceeds_cap() {
        let (mut ext, seen) = extension(250, 3);
        for i in 0..7 {
            tap(&mut ext, A, i * 50);
        }
        run_timers(&mut ext, 2000);

        let counts: Vec<u16> = seen.borrow().iter().map(|e| e.tap_count).collect();
        assert_eq!(counts, vec![3, 3, 1]);
    }

    #[test]
    fn huge_window_clamps_deadline() {
        let (mut ext, seen) = extension(u64::MAX, 3);
        tap(&mut ext, A, 0);
        tap(&mut ext, A, 100);
        assert_eq!(ext.next_deadline(), Some(u64::MAX));

        run_timers(&mut ext, 1_000_000);
        assert!(seen.borrow().is_empty());

        tap(&mut ext, A, 2_000_000);
        assert_eq!(taps(&seen), vec![(30, 3, 2_000_000)]);
    }

    #[test]
    fn zero_max_taps_is_rejected() {
        let config = MultiTapConfig {
            multi_press_window_ms: 250,
            max_taps: 0,
        };
        assert!(MultiTapExtension::<KeyCode>::new(0, &config).is_err());

        let (mut ext, _) = extension(250, 3);
        assert!(ext.set_max_taps(0).is_err());
        assert_eq!(ext.max_taps(), 3);
        ext.set_max_taps(2).unwrap();
        assert_eq!(ext.max_taps(), 2);
    }
}
