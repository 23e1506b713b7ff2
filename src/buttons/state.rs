//! Per-device button state table

use super::ButtonCode;
use crate::clock::Clock;
use crate::error::InputError;
use crate::extensions::ButtonStateExtension;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::rc::Rc;

/// Raw binary signal of a single button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ButtonState {
    #[default]
    Up,
    Down,
    /// "No change" sentinel; never stored in a table
    NotSet,
}

impl ButtonState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            Self::Down
        } else {
            Self::Up
        }
    }

    pub fn is_down(&self) -> bool {
        *self == Self::Down
    }
}

/// Current state of every button on one device
///
/// The table is the single source of truth for "is this button down".
/// Duplicate reports and [`ButtonState::NotSet`] are absorbed here; every
/// real transition is fanned out to the registered extensions in
/// registration order.
pub struct ButtonsState<B: ButtonCode> {
    states: Box<[ButtonState]>,
    extensions: Vec<Box<dyn ButtonStateExtension<B>>>,
    clock: Rc<dyn Clock>,
    _code: PhantomData<B>,
}

impl<B: ButtonCode> ButtonsState<B> {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            states: vec![ButtonState::Up; B::CAPACITY].into_boxed_slice(),
            extensions: Vec::new(),
            clock,
            _code: PhantomData,
        }
    }

    /// Current state of a button
    pub fn button_state(&self, button: B) -> Result<ButtonState, InputError> {
        let index = button.checked_index()?;
        Ok(self.states[index])
    }

    /// Record a new state for a button.
    ///
    /// Returns `Ok(true)` when the update was a real transition that reached
    /// the extensions, `Ok(false)` for a no-op.
    pub fn set_button_state(
        &mut self,
        button: B,
        new_state: ButtonState,
    ) -> Result<bool, InputError> {
        let index = button.checked_index()?;
        let old_state = self.states[index];

        if new_state == ButtonState::NotSet || new_state == old_state {
            log::trace!("{}: {:?} ignored (stored {:?})", button, new_state, old_state);
            return Ok(false);
        }

        self.states[index] = new_state;
        let now = self.clock.now_ms();
        log::trace!("{}: {:?} -> {:?} at {}ms", button, old_state, new_state, now);

        for extension in self.extensions.iter_mut() {
            extension.on_button_transition(button, old_state, new_state, now);
        }
        Ok(true)
    }

    /// Register an extension. Transitions before this call are not replayed.
    pub fn add_extension(&mut self, extension: Box<dyn ButtonStateExtension<B>>) {
        log::debug!("Adding {} extension", extension.name());
        self.extensions.push(extension);
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Buttons currently held down, in code order
    pub fn pressed_buttons(&self) -> impl Iterator<Item = B> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_down())
            .filter_map(|(index, _)| B::from_raw(index as u16).ok())
    }

    /// Earliest timer deadline of any extension
    pub fn next_deadline(&self) -> Option<u64> {
        self.extensions
            .iter()
            .filter_map(|extension| extension.next_deadline())
            .min()
    }

    /// Service every extension timer that is due on the current clock.
    ///
    /// Returns the number of extensions that fired.
    pub fn poll_timers(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut fired = 0;
        for extension in self.extensions.iter_mut() {
            if extension.next_deadline().is_some_and(|due| due <= now) {
                extension.on_timer(now);
                fired += 1;
            }
        }
        fired
    }
}
