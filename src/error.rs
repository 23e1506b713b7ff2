//! Error types for the button pipeline

use crate::registry::{DeviceId, DeviceKind};
use thiserror::Error;

/// Contract violations detected before any state is touched.
///
/// These indicate a broken normalization step upstream of the pipeline.
/// Nothing is retried; the offending call is rejected as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Button code does not fit the device class' table
    #[error("button code {code} is out of range (capacity {capacity})")]
    ButtonOutOfRange { code: usize, capacity: usize },

    /// Lookup of a device that was never registered (or was removed)
    #[error("no {kind} device with id {id}")]
    UnknownDevice { kind: DeviceKind, id: DeviceId },

    /// Extension or registry settings that cannot work
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
