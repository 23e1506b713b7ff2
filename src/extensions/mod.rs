//! Extensions that derive semantic events from raw button transitions
//!
//! A [`ButtonsState`](crate::buttons::ButtonsState) table forwards each real
//! transition to its extensions. Extensions keep their own per-button data
//! and may ask to be woken later through [`ButtonStateExtension::next_deadline`].

mod multitap;
mod standard;

pub use multitap::{MultiTapEvent, MultiTapExtension};
pub use standard::{ButtonEvent, EventType, StandardPressExtension};

use crate::buttons::{ButtonCode, ButtonState};

/// Observer of one device's button transitions
pub trait ButtonStateExtension<B: ButtonCode> {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// A button changed state. `now` is the table's clock in milliseconds.
    fn on_button_transition(&mut self, button: B, old: ButtonState, new: ButtonState, now: u64);

    /// Clock time at which [`on_timer`](Self::on_timer) should run next
    fn next_deadline(&self) -> Option<u64> {
        None
    }

    /// Deferred work whose deadline has passed
    fn on_timer(&mut self, _now: u64) {}
}
