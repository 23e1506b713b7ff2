//! Button code spaces
//!
//! Each device class addresses its buttons with its own numeric code type.
//! The code type fixes the size of the per-device state table, so a code is
//! validated against [`ButtonCode::CAPACITY`] before it reaches a table.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// A numeric button identifier with a bounded code space
pub trait ButtonCode: Copy + Ord + Hash + fmt::Debug + fmt::Display + 'static {
    /// Number of slots in a state table for this code type
    const CAPACITY: usize;

    /// Table index of this code
    fn index(self) -> usize;

    /// Validate a raw code coming from an input source
    fn from_raw(code: u16) -> Result<Self, InputError>;

    /// Check that the code fits the table
    fn checked_index(self) -> Result<usize, InputError> {
        let index = self.index();
        if index < Self::CAPACITY {
            Ok(index)
        } else {
            Err(InputError::ButtonOutOfRange {
                code: index,
                capacity: Self::CAPACITY,
            })
        }
    }
}

fn out_of_range(code: u16, capacity: usize) -> InputError {
    InputError::ButtonOutOfRange {
        code: code as usize,
        capacity,
    }
}

/// Keyboard scan code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Scan code of the `Q` key (set 1 / evdev)
    pub const Q: KeyCode = KeyCode(16);

    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key {}", self.0)
    }
}

impl ButtonCode for KeyCode {
    const CAPACITY: usize = 58000;

    fn index(self) -> usize {
        self.0 as usize
    }

    fn from_raw(code: u16) -> Result<Self, InputError> {
        if (code as usize) < Self::CAPACITY {
            Ok(Self(code))
        } else {
            Err(out_of_range(code, Self::CAPACITY))
        }
    }
}

/// Mouse button index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
    Back = 3,
    Forward = 4,
    Button6 = 5,
    Button7 = 6,
    Button8 = 7,
}

impl MouseButton {
    pub const ALL: [MouseButton; 8] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Back,
        MouseButton::Forward,
        MouseButton::Button6,
        MouseButton::Button7,
        MouseButton::Button8,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "MouseButtonLeft",
            Self::Right => "MouseButtonRight",
            Self::Middle => "MouseButtonMiddle",
            Self::Back => "MouseButtonBack",
            Self::Forward => "MouseButtonForward",
            Self::Button6 => "MouseButton_6",
            Self::Button7 => "MouseButton_7",
            Self::Button8 => "MouseButton_8",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ButtonCode for MouseButton {
    const CAPACITY: usize = 8;

    fn index(self) -> usize {
        self as usize
    }

    fn from_raw(code: u16) -> Result<Self, InputError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| out_of_range(code, Self::CAPACITY))
    }
}

/// Generic HID controller button index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HidButton(pub u8);

impl fmt::Display for HidButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HID Button {}", self.0)
    }
}

impl ButtonCode for HidButton {
    const CAPACITY: usize = 32;

    fn index(self) -> usize {
        self.0 as usize
    }

    fn from_raw(code: u16) -> Result<Self, InputError> {
        if (code as usize) < Self::CAPACITY {
            Ok(Self(code as u8))
        } else {
            Err(out_of_range(code, Self::CAPACITY))
        }
    }
}
