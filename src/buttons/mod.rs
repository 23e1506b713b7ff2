//! Button codes and per-device state tables

mod code;
mod state;

pub use code::{ButtonCode, HidButton, KeyCode, MouseButton};
pub use state::{ButtonState, ButtonsState};
