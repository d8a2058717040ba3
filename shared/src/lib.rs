//! Shared types and collaborator interfaces for the PTZ tracker.
//!
//! The `hardware` crate implements the collaborator traits defined here for real
//! devices; the `ptz` pipeline consumes them. Every trait has a no-op
//! implementation for hardware that is not present.

pub mod detection;
pub mod image_size;
pub mod input;
pub mod radar;
pub mod telemetry;

pub use detection::{identities, BoundingBox, Detection, TrackIdentity};
pub use image_size::ImageSize;
pub use input::{ManualInput, ManualInputSource, NoInput};
pub use radar::{NoDisplay, RadarColor, RadarDisplay, RadarFrame, RADAR_SIZE};
pub use telemetry::{NoTemperature, TemperatureSource};
