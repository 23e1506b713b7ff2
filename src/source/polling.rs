//! Portable source that polls global keyboard and mouse state

use super::InputSource;
use crate::buttons::{ButtonState, KeyCode, MouseButton};
use crate::registry::RawTransition;
use device_query::{DeviceQuery, DeviceState, Keycode};

/// Keyboard and mouse reported by the polling source; the OS merges all
/// physical devices into one.
const POLLED_DEVICE: u16 = 0;

/// Held items between two polls, diffed into edges
#[derive(Debug, Clone)]
pub struct PressedSet<T> {
    held: Vec<T>,
}

impl<T> Default for PressedSet<T> {
    fn default() -> Self {
        Self { held: Vec::new() }
    }
}

impl<T: Copy + PartialEq> PressedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held set; returns new presses followed by releases
    pub fn update(&mut self, current: Vec<T>) -> Vec<(T, ButtonState)> {
        let mut edges: Vec<(T, ButtonState)> = current
            .iter()
            .filter(|item| !self.held.contains(item))
            .map(|item| (*item, ButtonState::Down))
            .collect();

        edges.extend(
            self.held
                .iter()
                .filter(|item| !current.contains(item))
                .map(|item| (*item, ButtonState::Up)),
        );

        self.held = current;
        edges
    }

    pub fn held(&self) -> &[T] {
        &self.held
    }
}

/// Polls `device_query` for the keys and mouse buttons currently held
pub struct PollingSource {
    device_state: DeviceState,
    keys: PressedSet<Keycode>,
    mouse: PressedSet<MouseButton>,
}

impl PollingSource {
    pub fn new() -> Self {
        Self {
            device_state: DeviceState::new(),
            keys: PressedSet::new(),
            mouse: PressedSet::new(),
        }
    }
}

impl Default for PollingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for PollingSource {
    fn name(&self) -> &'static str {
        "device_query"
    }

    fn poll(&mut self) -> Vec<RawTransition> {
        let mut transitions = Vec::new();

        for (key, state) in self.keys.update(self.device_state.get_keys()) {
            match scan_code(key) {
                Some(code) => transitions.push(RawTransition::key(POLLED_DEVICE, code, state)),
                None => log::trace!("Unmapped key {:?}", key),
            }
        }

        let pressed = self.device_state.get_mouse().button_pressed;
        let held = mouse_buttons(&pressed, mouse_slots());
        for (button, state) in self.mouse.update(held) {
            transitions.push(RawTransition::mouse(POLLED_DEVICE, button, state));
        }

        transitions
    }
}

/// `device_query` slots on X11: core buttons 1-3 are left, middle and
/// right; 4 and 5 are the scroll wheel and are not buttons.
const X11_MOUSE_SLOTS: [Option<MouseButton>; 6] = [
    None,
    Some(MouseButton::Left),
    Some(MouseButton::Middle),
    Some(MouseButton::Right),
    None,
    None,
];

/// `device_query` slots on Windows (VK_LBUTTON, VK_RBUTTON, VK_MBUTTON,
/// VK_XBUTTON1, VK_XBUTTON2) and macOS (left, right, center)
const NATIVE_MOUSE_SLOTS: [Option<MouseButton>; 6] = [
    None,
    Some(MouseButton::Left),
    Some(MouseButton::Right),
    Some(MouseButton::Middle),
    Some(MouseButton::Back),
    Some(MouseButton::Forward),
];

fn mouse_slots() -> &'static [Option<MouseButton>] {
    if cfg!(target_os = "linux") {
        &X11_MOUSE_SLOTS
    } else {
        &NATIVE_MOUSE_SLOTS
    }
}

/// Mouse buttons marked as pressed. Slots missing from the table are ignored.
fn mouse_buttons(pressed: &[bool], slots: &[Option<MouseButton>]) -> Vec<MouseButton> {
    pressed
        .iter()
        .zip(slots)
        .filter(|(down, _)| **down)
        .filter_map(|(_, button)| *button)
        .collect()
}

/// Linux evdev scan code for a `device_query` key
pub fn scan_code(key: Keycode) -> Option<KeyCode> {
    use device_query::Keycode as DK;
    let code = match key {
        DK::Escape => 1,
        DK::Key1 => 2,
        DK::Key2 => 3,
        DK::Key3 => 4,
        DK::Key4 => 5,
        DK::Key5 => 6,
        DK::Key6 => 7,
        DK::Key7 => 8,
        DK::Key8 => 9,
        DK::Key9 => 10,
        DK::Key0 => 11,
        DK::Minus => 12,
        DK::Equal => 13,
        DK::Backspace => 14,
        DK::Tab => 15,
        DK::Q => 16,
        DK::W => 17,
        DK::E => 18,
        DK::R => 19,
        DK::T => 20,
        DK::Y => 21,
        DK::U => 22,
        DK::I => 23,
        DK::O => 24,
        DK::P => 25,
        DK::LeftBracket => 26,
        DK::RightBracket => 27,
        DK::Enter => 28,
        DK::LControl => 29,
        DK::A => 30,
        DK::S => 31,
        DK::D => 32,
        DK::F => 33,
        DK::G => 34,
        DK::H => 35,
        DK::J => 36,
        DK::K => 37,
        DK::L => 38,
        DK::Semicolon => 39,
        DK::Apostrophe => 40,
        DK::Grave => 41,
        DK::LShift => 42,
        DK::BackSlash => 43,
        DK::Z => 44,
        DK::X => 45,
        DK::C => 46,
        DK::V => 47,
        DK::B => 48,
        DK::N => 49,
        DK::M => 50,
        DK::Comma => 51,
        DK::Dot => 52,
        DK::Slash => 53,
        DK::RShift => 54,
        DK::NumpadMultiply => 55,
        DK::LAlt => 56,
        DK::Space => 57,
        DK::CapsLock => 58,
        DK::F1 => 59,
        DK::F2 => 60,
        DK::F3 => 61,
        DK::F4 => 62,
        DK::F5 => 63,
        DK::F6 => 64,
        DK::F7 => 65,
        DK::F8 => 66,
        DK::F9 => 67,
        DK::F10 => 68,
        DK::Numpad7 => 71,
        DK::Numpad8 => 72,
        DK::Numpad9 => 73,
        DK::NumpadSubtract => 74,
        DK::Numpad4 => 75,
        DK::Numpad5 => 76,
        DK::Numpad6 => 77,
        DK::NumpadAdd => 78,
        DK::Numpad1 => 79,
        DK::Numpad2 => 80,
        DK::Numpad3 => 81,
        DK::Numpad0 => 82,
        DK::F11 => 87,
        DK::F12 => 88,
        DK::RControl => 97,
        DK::NumpadDivide => 98,
        DK::RAlt => 100,
        DK::Home => 102,
        DK::Up => 103,
        DK::PageUp => 104,
        DK::Left => 105,
        DK::Right => 106,
        DK::End => 107,
        DK::Down => 108,
        DK::PageDown => 109,
        DK::Insert => 110,
        DK::Delete => 111,
        DK::LMeta => 125,
        DK::RMeta => 126,
        _ => return None,
    };
    Some(KeyCode(code))
}
