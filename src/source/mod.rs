//! Input sources
//!
//! A source turns whatever the platform offers into [`RawTransition`]s for
//! the [`DeviceRegistry`](crate::registry::DeviceRegistry). Sources only
//! report edges; deduplication, timing and gesture detection happen in the
//! registry.

#[cfg(target_os = "linux")]
mod evdev;
mod polling;

#[cfg(target_os = "linux")]
pub use evdev::{classify_code, EvdevError, EvdevSource};
pub use polling::{PollingSource, PressedSet};

use crate::registry::{DeviceId, RawTransition};

/// Something that can be drained for button transitions
pub trait InputSource {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Collect every transition observed since the previous call
    fn poll(&mut self) -> Vec<RawTransition>;

    /// Devices that went away since the previous call
    fn take_disconnected(&mut self) -> Vec<DeviceId> {
        Vec::new()
    }
}

/// Pick the best source for this platform.
///
/// On Linux raw evdev nodes are preferred when `prefer_evdev` is set and at
/// least one node can be opened; otherwise the portable polling source is
/// used.
pub fn open_default(prefer_evdev: bool) -> Box<dyn InputSource> {
    if prefer_evdev {
        if let Some(source) = open_evdev() {
            return source;
        }
    }
    log::info!("Polling keyboard and mouse state");
    Box::new(PollingSource::new())
}

#[cfg(target_os = "linux")]
fn open_evdev() -> Option<Box<dyn InputSource>> {
    match EvdevSource::new() {
        Ok(source) => {
            log::info!("Reading {} evdev device(s)", source.device_count());
            Some(Box::new(source))
        }
        Err(e) => {
            log::warn!("evdev unavailable, falling back to polling: {}", e);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn open_evdev() -> Option<Box<dyn InputSource>> {
    None
}
