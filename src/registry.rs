//! Device registry
//!
//! Maps each physical device to its own [`ButtonsState`] table with a
//! [`StandardPressExtension`] and a [`MultiTapExtension`] attached. Tables are
//! created on the first transition that names an unseen device id.
//!
//! Events from every device of a class are forwarded to that class' group
//! subscribers, so listeners registered on a group also see devices that
//! connect later.
//!
//! # Example
//!
//! ```
//! use button_events::clock::ManualClock;
//! use button_events::{ButtonState, Config, DeviceRegistry, KeyCode, RawTransition};
//! use std::rc::Rc;
//!
//! let clock = ManualClock::new();
//! let mut registry = DeviceRegistry::new(Rc::new(clock.clone()), Config::default()).unwrap();
//! registry.keyboards().subscribe_buttons(|event| println!("{:?}", event));
//!
//! registry.process(RawTransition::key(1, KeyCode::Q, ButtonState::Down)).unwrap();
//! assert_eq!(registry.device_count(), 1);
//! ```

use crate::buttons::{ButtonCode, ButtonState, ButtonsState, HidButton, KeyCode, MouseButton};
use crate::clock::Clock;
use crate::config::{Config, MultiTapConfig, StandardPressConfig};
use crate::error::InputError;
use crate::eventbus::{EventBus, SubscriberId};
use crate::extensions::{ButtonEvent, MultiTapEvent, MultiTapExtension, StandardPressExtension};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Identifier of a connected device, stable while it stays connected
pub type DeviceId = u16;

/// Device class; each class has its own button code space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    Hid,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyboard => f.write_str("keyboard"),
            Self::Mouse => f.write_str("mouse"),
            Self::Hid => f.write_str("HID"),
        }
    }
}

/// One normalized button report from an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTransition {
    pub kind: DeviceKind,
    pub device: DeviceId,
    /// Raw code, validated against the class' code space on ingestion
    pub button: u16,
    pub state: ButtonState,
}

impl RawTransition {
    pub fn key(device: DeviceId, key: KeyCode, state: ButtonState) -> Self {
        Self {
            kind: DeviceKind::Keyboard,
            device,
            button: key.0,
            state,
        }
    }

    pub fn mouse(device: DeviceId, button: MouseButton, state: ButtonState) -> Self {
        Self {
            kind: DeviceKind::Mouse,
            device,
            button: button as u16,
            state,
        }
    }

    pub fn hid(device: DeviceId, button: HidButton, state: ButtonState) -> Self {
        Self {
            kind: DeviceKind::Hid,
            device,
            button: button.0 as u16,
            state,
        }
    }
}

/// All devices of one class
pub struct DeviceGroup<B: ButtonCode> {
    kind: DeviceKind,
    clock: Rc<dyn Clock>,
    standard: StandardPressConfig,
    multi_tap: MultiTapConfig,
    devices: BTreeMap<DeviceId, ButtonsState<B>>,
    button_events: Rc<RefCell<EventBus<ButtonEvent<B>>>>,
    tap_events: Rc<RefCell<EventBus<MultiTapEvent<B>>>>,
}

impl<B: ButtonCode> DeviceGroup<B> {
    fn new(kind: DeviceKind, clock: Rc<dyn Clock>, config: &Config) -> Self {
        Self {
            kind,
            clock,
            standard: config.standard,
            multi_tap: config.multi_tap,
            devices: BTreeMap::new(),
            button_events: Rc::new(RefCell::new(EventBus::new())),
            tap_events: Rc::new(RefCell::new(EventBus::new())),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Listen to press/release/repeat events of every device in the group.
    ///
    /// The listener must not subscribe or unsubscribe from inside a callback.
    pub fn subscribe_buttons(
        &self,
        listener: impl FnMut(&ButtonEvent<B>) + 'static,
    ) -> SubscriberId {
        self.button_events.borrow_mut().subscribe(listener)
    }

    /// Listen to multi-tap events of every device in the group
    pub fn subscribe_taps(
        &self,
        listener: impl FnMut(&MultiTapEvent<B>) + 'static,
    ) -> SubscriberId {
        self.tap_events.borrow_mut().subscribe(listener)
    }

    pub fn unsubscribe_buttons(&self, id: SubscriberId) -> bool {
        self.button_events.borrow_mut().unsubscribe(id)
    }

    pub fn unsubscribe_taps(&self, id: SubscriberId) -> bool {
        self.tap_events.borrow_mut().unsubscribe(id)
    }

    /// Table of a known device
    pub fn device(&self, id: DeviceId) -> Result<&ButtonsState<B>, InputError> {
        self.devices.get(&id).ok_or(InputError::UnknownDevice {
            kind: self.kind,
            id,
        })
    }

    /// Ids of the devices seen so far, ascending
    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forward a transition to a device, creating its table on first use
    pub fn set_button_state(
        &mut self,
        id: DeviceId,
        button: B,
        state: ButtonState,
    ) -> Result<bool, InputError> {
        button.checked_index()?;
        if !self.devices.contains_key(&id) {
            let table = self.create_device(id)?;
            self.devices.insert(id, table);
        }
        match self.devices.get_mut(&id) {
            Some(table) => table.set_button_state(button, state),
            None => Err(InputError::UnknownDevice {
                kind: self.kind,
                id,
            }),
        }
    }

    /// Forget a device. Open repeat and multi-tap state is dropped without
    /// emitting events.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<(), InputError> {
        match self.devices.remove(&id) {
            Some(_) => {
                log::debug!("Removed {} device {}", self.kind, id);
                Ok(())
            }
            None => Err(InputError::UnknownDevice {
                kind: self.kind,
                id,
            }),
        }
    }

    fn create_device(&self, id: DeviceId) -> Result<ButtonsState<B>, InputError> {
        let mut standard = StandardPressExtension::new(id, &self.standard);
        let buttons = self.button_events.clone();
        standard
            .events_mut()
            .subscribe(move |event: &ButtonEvent<B>| buttons.borrow_mut().emit(event));

        let mut multi_tap = MultiTapExtension::new(id, &self.multi_tap)?;
        let taps = self.tap_events.clone();
        multi_tap
            .events_mut()
            .subscribe(move |event: &MultiTapEvent<B>| taps.borrow_mut().emit(event));

        let mut table = ButtonsState::new(self.clock.clone());
        table.add_extension(Box::new(standard));
        table.add_extension(Box::new(multi_tap));

        log::debug!("Created {} device {}", self.kind, id);
        Ok(table)
    }

    fn next_deadline(&self) -> Option<u64> {
        self.devices
            .values()
            .filter_map(|table| table.next_deadline())
            .min()
    }

    fn poll_timers(&mut self) -> usize {
        self.devices
            .values_mut()
            .map(|table| table.poll_timers())
            .sum()
    }
}

/// Owner of every device table, one group per device class
pub struct DeviceRegistry {
    keyboards: DeviceGroup<KeyCode>,
    mice: DeviceGroup<MouseButton>,
    controllers: DeviceGroup<HidButton>,
}

impl DeviceRegistry {
    /// Create an empty registry. Every table shares `clock`.
    pub fn new(clock: Rc<dyn Clock>, config: Config) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            keyboards: DeviceGroup::new(DeviceKind::Keyboard, clock.clone(), &config),
            mice: DeviceGroup::new(DeviceKind::Mouse, clock.clone(), &config),
            controllers: DeviceGroup::new(DeviceKind::Hid, clock, &config),
        })
    }

    pub fn keyboards(&self) -> &DeviceGroup<KeyCode> {
        &self.keyboards
    }

    pub fn mice(&self) -> &DeviceGroup<MouseButton> {
        &self.mice
    }

    pub fn controllers(&self) -> &DeviceGroup<HidButton> {
        &self.controllers
    }

    /// Route one raw transition to its device.
    ///
    /// The button code is validated before any table is created or touched.
    /// Returns whether the transition changed the stored state.
    pub fn process(&mut self, transition: RawTransition) -> Result<bool, InputError> {
        let RawTransition {
            kind,
            device,
            button,
            state,
        } = transition;

        match kind {
            DeviceKind::Keyboard => {
                let code = KeyCode::from_raw(button)?;
                self.keyboards.set_button_state(device, code, state)
            }
            DeviceKind::Mouse => {
                let code = MouseButton::from_raw(button)?;
                self.mice.set_button_state(device, code, state)
            }
            DeviceKind::Hid => {
                let code = HidButton::from_raw(button)?;
                self.controllers.set_button_state(device, code, state)
            }
        }
    }

    /// Current state of one button on a known device
    pub fn button_state(
        &self,
        kind: DeviceKind,
        device: DeviceId,
        button: u16,
    ) -> Result<ButtonState, InputError> {
        match kind {
            DeviceKind::Keyboard => {
                let code = KeyCode::from_raw(button)?;
                self.keyboards.device(device)?.button_state(code)
            }
            DeviceKind::Mouse => {
                let code = MouseButton::from_raw(button)?;
                self.mice.device(device)?.button_state(code)
            }
            DeviceKind::Hid => {
                let code = HidButton::from_raw(button)?;
                self.controllers.device(device)?.button_state(code)
            }
        }
    }

    /// Drop a disconnected device and all of its state
    pub fn remove_device(
        &mut self,
        kind: DeviceKind,
        device: DeviceId,
    ) -> Result<(), InputError> {
        match kind {
            DeviceKind::Keyboard => self.keyboards.remove_device(device),
            DeviceKind::Mouse => self.mice.remove_device(device),
            DeviceKind::Hid => self.controllers.remove_device(device),
        }
    }

    /// Drop a disconnected device id from every class it was seen in.
    ///
    /// Sources that share one id across classes cannot tell which classes the
    /// device reported, so classes without that id are skipped. Returns how
    /// many tables were dropped.
    pub fn disconnect(&mut self, device: DeviceId) -> Result<usize, InputError> {
        let mut removed = 0;
        for kind in [DeviceKind::Keyboard, DeviceKind::Mouse, DeviceKind::Hid] {
            match self.remove_device(kind, device) {
                Ok(()) => removed += 1,
                Err(InputError::UnknownDevice { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    pub fn device_count(&self) -> usize {
        self.keyboards.len() + self.mice.len() + self.controllers.len()
    }

    /// Earliest pending timer over all devices
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.keyboards.next_deadline(),
            self.mice.next_deadline(),
            self.controllers.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fire every timer that is due; returns how many fired
    pub fn poll_timers(&mut self) -> usize {
        self.keyboards.poll_timers() + self.mice.poll_timers() + self.controllers.poll_timers()
    }
}
