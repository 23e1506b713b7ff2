//! Press/release events with press counting and key repeat

use super::ButtonStateExtension;
use crate::buttons::{ButtonCode, ButtonState};
use crate::config::StandardPressConfig;
use crate::eventbus::EventBus;
use crate::registry::DeviceId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Kind of a standard button event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    Pressed,
    Released,
}

/// A press or release, possibly synthesized by key repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonEvent<B> {
    /// Device the button belongs to
    pub device: DeviceId,
    pub button: B,
    pub event_type: EventType,
    /// Presses of this button that followed each other within the
    /// multi-press window, counted from 0
    pub press_count: u16,
    /// Repeat signals sent so far while the button is held
    pub repeat_count: u16,
    /// Time the button has been held, set on repeat events only
    pub actuation_time_ms: u64,
    /// Clock time of emission
    pub timestamp_ms: u64,
}

/// Per-button bookkeeping
#[derive(Debug, Clone, Default)]
struct ButtonData {
    /// Time of the last observed transition
    last_transition: Option<u64>,
    state: ButtonState,
    press_counter: u16,
    actuation_timestamp: u64,
    repeat_timestamp: u64,
    repeat_count: u16,
}

/// Turns raw transitions into [`ButtonEvent`]s
///
/// A press that follows the previous transition of the same button within
/// the multi-press window increments the press counter; otherwise the counter
/// starts over at 0. While a button is held and the repeat rate is non-zero,
/// a shared repeat timer re-emits `Pressed` with a growing repeat count.
pub struct StandardPressExtension<B: ButtonCode> {
    device: DeviceId,
    multi_press_window: u64,
    /// Zero disables key repeat
    repeat_rate: u64,
    buttons: HashMap<B, ButtonData>,
    /// Buttons that receive repeat signals
    pressed: BTreeSet<B>,
    repeat_deadline: Option<u64>,
    events: EventBus<ButtonEvent<B>>,
}

impl<B: ButtonCode> StandardPressExtension<B> {
    pub fn new(device: DeviceId, config: &StandardPressConfig) -> Self {
        Self {
            device,
            multi_press_window: config.multi_press_window_ms,
            repeat_rate: config.repeat_rate_ms,
            buttons: HashMap::new(),
            pressed: BTreeSet::new(),
            repeat_deadline: None,
            events: EventBus::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.device
    }

    pub fn repeat_rate(&self) -> u64 {
        self.repeat_rate
    }

    /// Change the repeat cadence. Zero stops repeating held buttons at once.
    pub fn set_repeat_rate(&mut self, repeat_rate_ms: u64) {
        self.repeat_rate = repeat_rate_ms;
        if repeat_rate_ms == 0 {
            for button in std::mem::take(&mut self.pressed) {
                if let Some(data) = self.buttons.get_mut(&button) {
                    data.actuation_timestamp = 0;
                    data.repeat_timestamp = 0;
                    data.repeat_count = 0;
                }
            }
            self.repeat_deadline = None;
        }
    }

    pub fn multi_press_window(&self) -> u64 {
        self.multi_press_window
    }

    /// Subscribers for this extension's events
    pub fn events_mut(&mut self) -> &mut EventBus<ButtonEvent<B>> {
        &mut self.events
    }

    fn make_event(
        &self,
        button: B,
        event_type: EventType,
        data: &ButtonData,
        actuation_time_ms: u64,
        now: u64,
    ) -> ButtonEvent<B> {
        ButtonEvent {
            device: self.device,
            button,
            event_type,
            press_count: data.press_counter,
            repeat_count: data.repeat_count,
            actuation_time_ms,
            timestamp_ms: now,
        }
    }

    fn emit(&mut self, event: ButtonEvent<B>) {
        log::trace!(
            "{} {:?} press_count={} repeat_count={}",
            event.button,
            event.event_type,
            event.press_count,
            event.repeat_count
        );
        self.events.emit(&event);
    }
}

impl<B: ButtonCode> ButtonStateExtension<B> for StandardPressExtension<B> {
    fn name(&self) -> &'static str {
        "standard press"
    }

    fn on_button_transition(&mut self, button: B, _old: ButtonState, new: ButtonState, now: u64) {
        let window = self.multi_press_window;
        let repeat_rate = self.repeat_rate;
        let mut data = self.buttons.get(&button).cloned().unwrap_or_default();

        if data.state == new || new == ButtonState::NotSet {
            return;
        }

        let within_window = data
            .last_transition
            .is_some_and(|last| now.saturating_sub(last) < window);

        let event = match (data.state, new) {
            (ButtonState::Up, ButtonState::Down) => {
                data.press_counter = if within_window {
                    data.press_counter.saturating_add(1)
                } else {
                    0
                };

                if repeat_rate > 0 {
                    self.pressed.insert(button);
                    data.actuation_timestamp = now;
                    data.repeat_timestamp = now;
                    if self.repeat_deadline.is_none() {
                        self.repeat_deadline = Some(now.saturating_add(repeat_rate));
                    }
                }

                Some(self.make_event(button, EventType::Pressed, &data, 0, now))
            }
            (_, ButtonState::Up) => {
                if repeat_rate > 0 {
                    self.pressed.remove(&button);
                    if self.pressed.is_empty() {
                        self.repeat_deadline = None;
                    }
                    data.actuation_timestamp = 0;
                    data.repeat_timestamp = 0;
                    data.repeat_count = 0;
                }

                let event = self.make_event(button, EventType::Released, &data, 0, now);

                // A late release still ends the multi-press sequence
                if !within_window {
                    data.press_counter = 0;
                }
                Some(event)
            }
            _ => None,
        };

        data.last_transition = Some(now);
        data.state = new;
        self.buttons.insert(button, data);

        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.repeat_deadline
    }

    fn on_timer(&mut self, now: u64) {
        if self.repeat_rate == 0 || self.pressed.is_empty() {
            self.repeat_deadline = None;
            return;
        }

        let mut repeats = Vec::new();
        for button in self.pressed.iter() {
            let Some(data) = self.buttons.get_mut(button) else {
                continue;
            };
            if now.saturating_sub(data.repeat_timestamp) >= self.repeat_rate {
                data.repeat_count = data.repeat_count.saturating_add(1);
                data.repeat_timestamp = now;
                repeats.push(ButtonEvent {
                    device: self.device,
                    button: *button,
                    event_type: EventType::Pressed,
                    press_count: data.press_counter,
                    repeat_count: data.repeat_count,
                    actuation_time_ms: now.saturating_sub(data.actuation_timestamp),
                    timestamp_ms: now,
                });
            }
        }

        self.repeat_deadline = Some(now.saturating_add(self.repeat_rate));
        for event in repeats {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::{KeyCode, MouseButton};
    use crate::test_helpers::{recorder, Recorded};

    const Q: KeyCode = KeyCode::Q;

    fn extension(
        window: u64,
        repeat: u64,
    ) -> (StandardPressExtension<KeyCode>, Recorded<ButtonEvent<KeyCode>>) {
        let config = StandardPressConfig {
            multi_press_window_ms: window,
            repeat_rate_ms: repeat,
        };
        let mut ext = StandardPressExtension::new(1, &config);
        let (listener, seen) = recorder();
        ext.events_mut().subscribe(listener);
        (ext, seen)
    }

    fn down<B: ButtonCode>(ext: &mut StandardPressExtension<B>, button: B, now: u64) {
        ext.on_button_transition(button, ButtonState::Up, ButtonState::Down, now);
    }

    fn up<B: ButtonCode>(ext: &mut StandardPressExtension<B>, button: B, now: u64) {
        ext.on_button_transition(button, ButtonState::Down, ButtonState::Up, now);
    }

    /// Fire every repeat deadline up to `until`
    fn run_timers<B: ButtonCode>(ext: &mut StandardPressExtension<B>, until: u64) {
        while let Some(due) = ext.next_deadline().filter(|due| *due <= until) {
            ext.on_timer(due);
        }
    }

    #[test]
    fn press_release_with_multi_press_counter() {
        let (mut ext, seen) = extension(250, 0);
        down(&mut ext, Q, 0);
        up(&mut ext, Q, 50);
        down(&mut ext, Q, 100);
        up(&mut ext, Q, 140);

        let got: Vec<_> = seen
            .borrow()
            .iter()
            .map(|e| (e.event_type, e.press_count, e.timestamp_ms))
            .collect();
        assert_eq!(
            got,
            vec![
                (EventType::Pressed, 0, 0),
                (EventType::Released, 0, 50),
                (EventType::Pressed, 1, 100),
                (EventType::Released, 1, 140),
            ]
        );
        assert!(seen.borrow().iter().all(|e| e.device == 1 && e.button == Q));
    }

    #[test]
    fn press_counter_grows_within_window() {
        let (mut ext, seen) = extension(250, 0);
        let mut t = 0;
        for _ in 0..5 {
            down(&mut ext, Q, t);
            up(&mut ext, Q, t + 20);
            t += 60;
        }

        let counts: Vec<u16> = seen
            .borrow()
            .iter()
            .filter(|e| e.event_type == EventType::Pressed)
            .map(|e| e.press_count)
            .collect();
        assert_eq!(counts, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn press_counter_resets_when_window_elapses() {
        let (mut ext, seen) = extension(250, 0);
        down(&mut ext, Q, 0);
        up(&mut ext, Q, 10);
        down(&mut ext, Q, 20);
        up(&mut ext, Q, 30);
        // Exactly one window after the last transition counts as a new press
        down(&mut ext, Q, 280);

        let last = *seen.borrow().last().unwrap();
        assert_eq!(last.event_type, EventType::Pressed);
        assert_eq!(last.press_count, 0);
    }

    #[test]
    fn late_release_clears_press_counter() {
        let (mut ext, seen) = extension(250, 0);
        down(&mut ext, Q, 0);
        up(&mut ext, Q, 10);
        down(&mut ext, Q, 20);
        up(&mut ext, Q, 600);

        {
            let events = seen.borrow();
            let release = events.last().unwrap();
            assert_eq!(release.event_type, EventType::Released);
            assert_eq!(release.press_count, 1);
        }

        // Counting restarts from the cleared value, not from 1
        down(&mut ext, Q, 700);
        assert_eq!(seen.borrow().last().unwrap().press_count, 1);
    }

    #[test]
    fn duplicate_transitions_are_ignored() {
        let (mut ext, seen) = extension(250, 0);
        down(&mut ext, Q, 0);
        down(&mut ext, Q, 5);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn huge_repeat_rate_clamps_deadline() {
        let (mut ext, seen) = extension(u64::MAX, u64::MAX);
        down(&mut ext, Q, 5);
        assert_eq!(ext.next_deadline(), Some(u64::MAX));

        run_timers(&mut ext, 10_000);
        ext.on_timer(u64::MAX - 1);
        assert_eq!(ext.next_deadline(), Some(u64::MAX));
        assert_eq!(seen.borrow().len(), 1);

        // Every later press is inside the window
        up(&mut ext, Q, 20);
        down(&mut ext, Q, 9_000);
        assert_eq!(seen.borrow().last().unwrap().press_count, 1);
    }

    #[test]
    fn repeat_disabled_arms_no_timer() {
        let (mut ext, seen) = extension(250, 0);
        down(&mut ext, Q, 0);
        assert_eq!(ext.next_deadline(), None);
        run_timers(&mut ext, 1000);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn held_mouse_button_repeats_until_release() {
        let config = StandardPressConfig {
            multi_press_window_ms: 250,
            repeat_rate_ms: 15,
        };
        let mut ext = StandardPressExtension::new(2, &config);
        let (listener, seen) = recorder();
        ext.events_mut().subscribe(listener);

        down(&mut ext, MouseButton::Left, 0);
        run_timers(&mut ext, 50);
        up(&mut ext, MouseButton::Left, 50);

        let got: Vec<_> = seen
            .borrow()
            .iter()
            .map(|e| (e.event_type, e.repeat_count, e.actuation_time_ms, e.timestamp_ms))
            .collect();
        assert_eq!(
            got,
            vec![
                (EventType::Pressed, 0, 0, 0),
                (EventType::Pressed, 1, 15, 15),
                (EventType::Pressed, 2, 30, 30),
                (EventType::Pressed, 3, 45, 45),
                (EventType::Released, 0, 0, 50),
            ]
        );
        assert_eq!(ext.next_deadline(), None);
    }

    #[test]
    fn repeat_count_matches_hold_duration() {
        for (hold, rate) in [(100, 10), (99, 10), (250, 15), (14, 15)] {
            let (mut ext, seen) = extension(250, rate);
            down(&mut ext, Q, 0);
            run_timers(&mut ext, hold);
            up(&mut ext, Q, hold);
            run_timers(&mut ext, hold + 500);

            let repeats = seen
                .borrow()
                .iter()
                .filter(|e| e.event_type == EventType::Pressed && e.repeat_count > 0)
                .count() as u64;
            assert_eq!(repeats, hold / rate, "hold {hold}ms at {rate}ms");
        }
    }

    #[test]
    fn repeat_timer_stays_armed_while_any_button_is_held() {
        let (mut ext, _) = extension(250, 10);
        down(&mut ext, KeyCode(30), 0);
        down(&mut ext, KeyCode(31), 3);
        up(&mut ext, KeyCode(30), 5);
        assert_eq!(ext.next_deadline(), Some(10));
        up(&mut ext, KeyCode(31), 6);
        assert_eq!(ext.next_deadline(), None);
    }

    #[test]
    fn button_pressed_between_ticks_waits_a_full_period() {
        let (mut ext, seen) = extension(250, 10);
        down(&mut ext, KeyCode(30), 0);
        down(&mut ext, KeyCode(31), 4);
        run_timers(&mut ext, 20);

        let repeats: Vec<_> = seen
            .borrow()
            .iter()
            .filter(|e| e.repeat_count > 0)
            .map(|e| (e.button.0, e.timestamp_ms))
            .collect();
        assert_eq!(repeats, vec![(30, 10), (30, 20), (31, 20)]);
    }

    #[test]
    fn setting_repeat_rate_to_zero_stops_repeats() {
        let (mut ext, seen) = extension(250, 10);
        down(&mut ext, Q, 0);
        run_timers(&mut ext, 10);
        ext.set_repeat_rate(0);
        assert_eq!(ext.repeat_rate(), 0);
        assert_eq!(ext.next_deadline(), None);
        run_timers(&mut ext, 100);
        up(&mut ext, Q, 100);

        let events = seen.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].event_type, EventType::Released);
    }

    #[test]
    fn released_event_reports_cleared_repeat_state() {
        let (mut ext, seen) = extension(250, 10);
        down(&mut ext, Q, 0);
        run_timers(&mut ext, 35);
        up(&mut ext, Q, 35);

        let events = seen.borrow();
        let release = events.last().unwrap();
        assert_eq!(release.event_type, EventType::Released);
        assert_eq!(release.repeat_count, 0);
        assert_eq!(release.actuation_time_ms, 0);
    }
}
