//! Sense HAT 8×8 LED matrix framebuffer

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use shared::{RadarDisplay, RadarFrame, RADAR_SIZE};
use tracing::warn;

/// Bytes in one full framebuffer write (64 RGB565 pixels).
pub const FRAME_BYTES: usize = RADAR_SIZE * RADAR_SIZE * 2;

/// Pack an 8-bit RGB triple into RGB565.
pub fn rgb565([r, g, b]: [u8; 3]) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Row-major little-endian RGB565 image of a radar frame.
pub fn encode_rgb565(frame: &RadarFrame) -> [u8; FRAME_BYTES] {
    let mut out = [0u8; FRAME_BYTES];
    for (i, px) in frame.pixels.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&rgb565(*px).to_le_bytes());
    }
    out
}

pub struct LedMatrix {
    device: File,
}

impl LedMatrix {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().write(true).open(path)?;
        Ok(Self { device })
    }

    fn write_frame(&mut self, frame: &RadarFrame) -> io::Result<()> {
        self.device.seek(SeekFrom::Start(0))?;
        self.device.write_all(&encode_rgb565(frame))?;
        self.device.flush()
    }
}

impl RadarDisplay for LedMatrix {
    fn show(&mut self, frame: &RadarFrame) {
        if let Err(e) = self.write_frame(frame) {
            warn!("LED matrix write failed: {e}");
        }
    }
}

impl Drop for LedMatrix {
    fn drop(&mut self) {
        self.clear();
    }
}
