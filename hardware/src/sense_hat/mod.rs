//! Raspberry Pi Sense HAT peripherals
//!
//! The HAT exposes its 5-way joystick as an evdev input device and its 8×8 LED
//! matrix as an RGB565 framebuffer. Both are located by their sysfs names, so the
//! event/framebuffer numbering does not matter.
//!
//! [`open_joystick`] and [`open_led_matrix`] return a no-op collaborator when the
//! HAT is not attached, so the caller decides once at startup and never again.

mod joystick;
mod led_matrix;

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use shared::{ManualInputSource, NoDisplay, NoInput, RadarDisplay};
use tracing::{debug, info, warn};

pub use joystick::{decode_events, InputEvent, Joystick, INPUT_EVENT_SIZE};
pub use led_matrix::{encode_rgb565, rgb565, LedMatrix, FRAME_BYTES};

/// sysfs name of the joystick input device.
pub const JOYSTICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";

/// sysfs name of the LED matrix framebuffer.
pub const LED_MATRIX_NAME: &str = "RPi-Sense FB";

fn read_name(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// First sysfs name file under `class_dir` matching `entry_glob` (relative to
/// `class_dir`, e.g. `event*/device/name`) whose contents equal `name`.
fn find_by_name(class_dir: &Path, entry_glob: &str, name: &str) -> Option<PathBuf> {
    let root = glob::Pattern::escape(&class_dir.to_string_lossy());
    let pattern = format!("{root}/{entry_glob}");
    let entries = match glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Bad sysfs pattern {pattern}: {e}");
            return None;
        }
    };

    for entry in entries {
        match entry {
            Ok(path) => {
                if read_name(&path).as_deref() == Some(name) {
                    return Some(path);
                }
            }
            Err(e) => debug!("Error accessing {pattern} entry: {e}"),
        }
    }
    None
}

/// Name of the sysfs class entry `levels` directories above a name file.
fn class_entry(name_file: &Path, levels: usize) -> Option<&std::ffi::OsStr> {
    name_file.ancestors().nth(levels)?.file_name()
}

/// Device node of the Sense HAT joystick, if attached.
pub fn find_joystick_device() -> Option<PathBuf> {
    let name_file = find_by_name(
        Path::new("/sys/class/input"),
        "event*/device/name",
        JOYSTICK_NAME,
    )?;
    class_entry(&name_file, 2).map(|event| Path::new("/dev/input").join(event))
}

/// Device node of the Sense HAT LED framebuffer, if attached.
pub fn find_led_matrix_device() -> Option<PathBuf> {
    let name_file = find_by_name(Path::new("/sys/class/graphics"), "fb*/name", LED_MATRIX_NAME)?;
    class_entry(&name_file, 1).map(|fb| Path::new("/dev").join(fb))
}

/// Joystick if present, otherwise a source that never reports input.
pub fn open_joystick() -> Box<dyn ManualInputSource + Send> {
    let Some(path) = find_joystick_device() else {
        info!("Sense HAT joystick not found, manual input disabled");
        return Box::new(NoInput);
    };
    match Joystick::open(&path) {
        Ok(js) => {
            info!("Sense HAT joystick at {}", path.display());
            Box::new(js)
        }
        Err(e) => {
            warn!("Failed to open joystick {}: {e}", path.display());
            Box::new(NoInput)
        }
    }
}

/// LED matrix if present, otherwise a display that discards frames.
pub fn open_led_matrix() -> Box<dyn RadarDisplay + Send> {
    let Some(path) = find_led_matrix_device() else {
        info!("Sense HAT LED matrix not found, radar disabled");
        return Box::new(NoDisplay);
    };
    match LedMatrix::open(&path) {
        Ok(leds) => {
            info!("Sense HAT LED matrix at {}", path.display());
            Box::new(leds)
        }
        Err(e) => {
            warn!("Failed to open LED matrix {}: {e}", path.display());
            Box::new(NoDisplay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name_matches_sysfs_layout() {
        let dir = tempfile::tempdir().unwrap();
        for (entry, name) in [("event0", "gpio-keys"), ("event3", JOYSTICK_NAME)] {
            let dev = dir.path().join(entry).join("device");
            fs::create_dir_all(&dev).unwrap();
            fs::write(dev.join("name"), format!("{name}\n")).unwrap();
        }
        // Same name outside the event* entries is ignored
        let mouse = dir.path().join("mouse0").join("device");
        fs::create_dir_all(&mouse).unwrap();
        fs::write(mouse.join("name"), JOYSTICK_NAME).unwrap();

        let found = find_by_name(dir.path(), "event*/device/name", JOYSTICK_NAME).unwrap();
        assert_eq!(found, dir.path().join("event3/device/name"));
        assert_eq!(class_entry(&found, 2).unwrap(), "event3");
        assert_eq!(
            find_by_name(dir.path(), "event*/device/name", "nothing"),
            None
        );
    }

    #[test]
    fn test_find_by_name_framebuffer_layout() {
        let dir = tempfile::tempdir().unwrap();
        for (entry, name) in [("fb0", "vc4drmfb"), ("fb1", LED_MATRIX_NAME)] {
            fs::create_dir_all(dir.path().join(entry)).unwrap();
            fs::write(dir.path().join(entry).join("name"), name).unwrap();
        }

        let found = find_by_name(dir.path(), "fb*/name", LED_MATRIX_NAME).unwrap();
        assert_eq!(class_entry(&found, 1).unwrap(), "fb1");
    }

    #[test]
    fn test_find_by_name_missing_class_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-class");
        assert_eq!(find_by_name(&missing, "fb*/name", LED_MATRIX_NAME), None);
    }
}
