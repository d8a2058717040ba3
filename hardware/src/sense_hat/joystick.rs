//! Sense HAT joystick over Linux evdev

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use shared::{ManualInput, ManualInputSource};
use tracing::{trace, warn};

const EV_KEY: u16 = 0x01;
const KEY_ENTER: u16 = 28;
const KEY_UP: u16 = 103;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_DOWN: u16 = 108;

const KEY_PRESSED: i32 = 1;

/// Kernel `struct input_event` with a native `timeval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct InputEvent {
    pub tv_sec: libc::c_long,
    pub tv_usec: libc::c_long,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

/// Size of one event record on this platform.
pub const INPUT_EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

impl InputEvent {
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            kind: EV_KEY,
            code,
            value,
            ..Zeroable::zeroed()
        }
    }

    fn is_press(&self) -> bool {
        self.kind == EV_KEY && self.value == KEY_PRESSED
    }
}

/// Fold a buffer of raw event records into one [`ManualInput`].
///
/// Only key presses count; releases and auto-repeat are ignored. A trailing
/// partial record is dropped.
pub fn decode_events(raw: &[u8]) -> ManualInput {
    let mut input = ManualInput::default();
    for chunk in raw.chunks_exact(INPUT_EVENT_SIZE) {
        let event: InputEvent = bytemuck::pod_read_unaligned(chunk);
        if !event.is_press() {
            continue;
        }
        match event.code {
            KEY_LEFT => input.target_delta -= 1,
            KEY_RIGHT => input.target_delta += 1,
            KEY_UP => input.zoom_delta += 1,
            KEY_DOWN => input.zoom_delta -= 1,
            KEY_ENTER => input.wide = true,
            other => trace!("Ignoring joystick key {other}"),
        }
    }
    input.target_delta = input.target_delta.clamp(-1, 1);
    input
}

/// Non-blocking reader for the joystick event device.
pub struct Joystick {
    device: File,
    buffer: Vec<u8>,
}

impl Joystick {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            device,
            buffer: vec![0u8; INPUT_EVENT_SIZE * 64],
        })
    }
}

impl ManualInputSource for Joystick {
    fn poll(&mut self) -> ManualInput {
        let mut input = ManualInput::default();
        loop {
            match self.device.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => input.merge(decode_events(&self.buffer[..n])),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Joystick read failed: {e}");
                    break;
                }
            }
        }
        input.target_delta = input.target_delta.clamp(-1, 1);
        input
    }
}
