//! Button events - semantic events from raw button transitions
//!
//! Turns per-device button edges from keyboards, mice and HID controllers
//! into presses, releases, key repeats and multi-tap gestures.
//!
//! The pipeline is single-threaded and cooperative: the host feeds
//! [`RawTransition`]s into a [`DeviceRegistry`], then calls
//! [`DeviceRegistry::poll_timers`] whenever the clock passes
//! [`DeviceRegistry::next_deadline`].

pub mod buttons;
pub mod clock;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod extensions;
pub mod registry;
pub mod source;

#[cfg(test)]
mod test_helpers;

pub use buttons::{ButtonCode, ButtonState, ButtonsState, HidButton, KeyCode, MouseButton};
pub use config::Config;
pub use error::InputError;
pub use extensions::{ButtonEvent, EventType, MultiTapEvent};
pub use registry::{DeviceId, DeviceKind, DeviceRegistry, RawTransition};
