//! Raw evdev source for Linux
//!
//! Opens every `/dev/input/event*` node that reports key capabilities and
//! reads `EV_KEY` events without blocking. Each node becomes one device id,
//! shared by the keyboard, mouse and HID classes, so a gaming mouse with
//! extra keys shows up as keyboard `n` and mouse `n`.

use super::InputSource;
use crate::buttons::ButtonState;
use crate::registry::{DeviceId, DeviceKind, RawTransition};
use nix::libc;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for evdev operations
#[derive(Error, Debug)]
pub enum EvdevError {
    #[error("No input devices with buttons found")]
    NoDevices,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// `struct input_event` as the kernel writes it on 64-bit targets
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct InputEvent {
    tv_sec: i64,
    tv_usec: i64,
    event_type: u16,
    code: u16,
    value: i32,
}

const EV_KEY: u16 = 0x01;
const INPUT_EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

const BTN_MOUSE: u16 = 0x110;
const BTN_JOYSTICK: u16 = 0x120;
const BTN_HID_END: u16 = 0x140;
const KEY_MAX_SCAN: u16 = 0x100;

/// Map an `EV_KEY` code to a device class and the code in that class' space.
///
/// Keyboard keys below `0x100` keep their scan code, `BTN_LEFT..` maps to
/// mouse buttons 0-7 and the joystick/gamepad block maps to HID buttons 0-31.
pub fn classify_code(code: u16) -> Option<(DeviceKind, u16)> {
    match code {
        0 => None,
        c if c < KEY_MAX_SCAN => Some((DeviceKind::Keyboard, c)),
        c if (BTN_MOUSE..BTN_MOUSE + 8).contains(&c) => Some((DeviceKind::Mouse, c - BTN_MOUSE)),
        c if (BTN_JOYSTICK..BTN_HID_END).contains(&c) => Some((DeviceKind::Hid, c - BTN_JOYSTICK)),
        _ => None,
    }
}

/// Decode an `EV_KEY` value; autorepeat (2) is dropped since repeats are
/// generated downstream.
fn key_state(value: i32) -> Option<ButtonState> {
    match value {
        0 => Some(ButtonState::Up),
        1 => Some(ButtonState::Down),
        _ => None,
    }
}

fn find_button_devices() -> Result<Vec<PathBuf>, EvdevError> {
    let input_dir = Path::new("/dev/input");
    if !input_dir.exists() {
        return Err(EvdevError::EnumerationFailed(
            "/dev/input does not exist".to_string(),
        ));
    }

    let mut nodes: Vec<PathBuf> = fs::read_dir(input_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .filter(|path| has_key_capabilities(path))
        .collect();

    if nodes.is_empty() {
        return Err(EvdevError::NoDevices);
    }
    nodes.sort();
    Ok(nodes)
}

/// Whether sysfs lists any `EV_KEY` codes for the node
fn has_key_capabilities(node: &Path) -> bool {
    let Some(name) = node.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let caps_path = format!("/sys/class/input/{}/device/capabilities/key", name);
    fs::read_to_string(caps_path)
        .map(|caps| {
            caps.split_whitespace()
                .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
                .any(|bits| bits != 0)
        })
        .unwrap_or(false)
}

struct Node {
    id: DeviceId,
    path: PathBuf,
    file: File,
}

/// Non-blocking reader over all evdev nodes with buttons
pub struct EvdevSource {
    nodes: Vec<Node>,
    disconnected: Vec<DeviceId>,
    buffer: Vec<u8>,
}

impl EvdevSource {
    pub fn new() -> Result<Self, EvdevError> {
        let mut nodes = Vec::new();

        for (id, path) in find_button_devices()?.into_iter().enumerate() {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    log::debug!("Skipping {}: permission denied", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let fd = file.as_raw_fd();
            // SAFETY: fd is owned by `file` and stays open for the call
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }

            log::debug!("Opened {} as device {}", path.display(), id);
            nodes.push(Node {
                id: id as DeviceId,
                path,
                file,
            });
        }

        if nodes.is_empty() {
            return Err(EvdevError::PermissionDenied(
                "cannot open any input device; run with sudo or join the 'input' group".to_string(),
            ));
        }

        Ok(Self {
            nodes,
            disconnected: Vec::new(),
            buffer: vec![0u8; INPUT_EVENT_SIZE * 64],
        })
    }

    pub fn device_count(&self) -> usize {
        self.nodes.len()
    }

    /// Paths of the open nodes, in device id order
    pub fn device_paths(&self) -> impl Iterator<Item = &Path> {
        self.nodes.iter().map(|node| node.path.as_path())
    }
}

fn parse_events(bytes: &[u8], device: DeviceId, out: &mut Vec<RawTransition>) {
    for chunk in bytes.chunks_exact(INPUT_EVENT_SIZE) {
        // SAFETY: chunk is exactly one `InputEvent`; read_unaligned copes
        // with the byte buffer's alignment
        let event: InputEvent =
            unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const InputEvent) };
        if event.event_type != EV_KEY {
            continue;
        }
        let (Some((kind, button)), Some(state)) =
            (classify_code(event.code), key_state(event.value))
        else {
            continue;
        };
        out.push(RawTransition {
            kind,
            device,
            button,
            state,
        });
    }
}

impl InputSource for EvdevSource {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn poll(&mut self) -> Vec<RawTransition> {
        let mut transitions = Vec::new();
        let mut lost = Vec::new();

        for (index, node) in self.nodes.iter_mut().enumerate() {
            loop {
                match node.file.read(&mut self.buffer) {
                    Ok(n) if n >= INPUT_EVENT_SIZE => {
                        parse_events(&self.buffer[..n], node.id, &mut transitions);
                    }
                    Ok(_) => break,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        log::warn!("Lost {}: {}", node.path.display(), e);
                        lost.push(index);
                        break;
                    }
                }
            }
        }

        for index in lost.into_iter().rev() {
            let node = self.nodes.remove(index);
            self.disconnected.push(node.id);
        }
        transitions
    }

    fn take_disconnected(&mut self) -> Vec<DeviceId> {
        std::mem::take(&mut self.disconnected)
    }
}
