//! Linux thermal zone temperature reader.
//!
//! Reads `/sys/class/thermal/thermal_zoneN/temp`, which reports millidegrees
//! Celsius as ASCII text.

use std::path::{Path, PathBuf};

use shared::TemperatureSource;
use tracing::trace;

/// Default CPU thermal zone on Raspberry Pi and most Linux boards.
pub const DEFAULT_THERMAL_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Temperature source backed by a sysfs thermal zone file.
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// True when the zone file exists.
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_PATH)
    }
}

/// Parse a millidegree reading such as `"48312\n"` into °C.
pub fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().map(|m| m / 1000.0)
}

impl TemperatureSource for ThermalZone {
    fn read_temperature(&mut self) -> Option<f64> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => parse_millidegrees(&raw),
            Err(e) => {
                trace!("Thermal read {:?} failed: {e}", self.path);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reads_millidegrees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "48312\n").unwrap();

        let mut zone = ThermalZone::new(&path);
        assert!(zone.is_present());
        assert_relative_eq!(zone.read_temperature().unwrap(), 48.312);
    }

    #[test]
    fn test_missing_or_garbage_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut missing = ThermalZone::new(dir.path().join("nope"));
        assert!(!missing.is_present());
        assert_eq!(missing.read_temperature(), None);

        assert_eq!(parse_millidegrees("not a number"), None);
    }
}
