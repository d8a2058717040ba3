//! Hardware drivers for the PTZ tracker.
//!
//! This crate provides drivers for the devices around the tracking pipeline.
//! Each driver is feature-gated for optional compilation.
//!
//! # Features
//!
//! - `gimbal` - Two-axis gimbal over UDP (binary framed protocol with CRC-16)
//! - `sense-hat` - Sense HAT joystick and 8x8 LED matrix (Linux only)
//!
//! The thermal zone reader is always available.

#[cfg(feature = "gimbal")]
pub mod gimbal;

#[cfg(all(target_os = "linux", feature = "sense-hat"))]
pub mod sense_hat;

pub mod thermal;
