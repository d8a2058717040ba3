//! Angle types for gimbal commands and attitude reports
//!
//! On the wire every angle is a little-endian `i16` in tenths of a degree.

/// Yaw travel declared by the hardware, in degrees.
pub const YAW_RANGE_DEG: (f64, f64) = (-135.0, 135.0);

/// Pitch travel declared by the hardware, in degrees.
pub const PITCH_RANGE_DEG: (f64, f64) = (-90.0, 45.0);

/// Wire resolution: one LSB is a tenth of a degree.
pub const DEGREES_PER_LSB: f64 = 0.1;

fn deg_to_tenths(deg: f64) -> i16 {
    (deg / DEGREES_PER_LSB)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn tenths_to_deg(raw: i16) -> f64 {
    raw as f64 * DEGREES_PER_LSB
}

fn clamp_axis(value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() {
        return 0.0_f64.clamp(min, max);
    }
    value.clamp(min, max)
}

/// Absolute yaw/pitch command, always within the hardware range.
///
/// The only constructor clamps, so an `AngleCommand` is exactly what goes on the
/// wire and what the caller should treat as the command actually sent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleCommand {
    yaw_deg: f64,
    pitch_deg: f64,
}

impl AngleCommand {
    /// Build a command, clamping each axis into its hardware range.
    ///
    /// NaN inputs are treated as 0°.
    pub fn clamped(yaw_deg: f64, pitch_deg: f64) -> Self {
        Self {
            yaw_deg: clamp_axis(yaw_deg, YAW_RANGE_DEG),
            pitch_deg: clamp_axis(pitch_deg, PITCH_RANGE_DEG),
        }
    }

    pub fn yaw_deg(&self) -> f64 {
        self.yaw_deg
    }

    pub fn pitch_deg(&self) -> f64 {
        self.pitch_deg
    }

    /// Payload for the angle-set command: yaw then pitch as LE `i16` tenths.
    pub fn to_payload(&self) -> [u8; 4] {
        let yaw = deg_to_tenths(self.yaw_deg).to_le_bytes();
        let pitch = deg_to_tenths(self.pitch_deg).to_le_bytes();
        [yaw[0], yaw[1], pitch[0], pitch[1]]
    }

    /// Decode an angle-set payload (used by test doubles of the device).
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < 4 {
            return None;
        }
        let yaw = i16::from_le_bytes([payload[0], payload[1]]);
        let pitch = i16::from_le_bytes([payload[2], payload[3]]);
        Some(Self::clamped(tenths_to_deg(yaw), tenths_to_deg(pitch)))
    }
}

/// Platform attitude reported by the device, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

impl Attitude {
    pub fn new(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Self {
        Self {
            yaw_deg,
            pitch_deg,
            roll_deg,
        }
    }

    /// Decode yaw, pitch, roll from the first six bytes of a payload.
    ///
    /// Bytes past the first six are ignored. Returns `None` for shorter payloads.
    pub fn from_tenths_le(payload: &[u8]) -> Option<Self> {
        if payload.len() < 6 {
            return None;
        }
        let word = |i: usize| i16::from_le_bytes([payload[i], payload[i + 1]]);
        Some(Self {
            yaw_deg: tenths_to_deg(word(0)),
            pitch_deg: tenths_to_deg(word(2)),
            roll_deg: tenths_to_deg(word(4)),
        })
    }

    /// Encode as yaw, pitch, roll LE `i16` tenths.
    pub fn to_tenths_le(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..2].copy_from_slice(&deg_to_tenths(self.yaw_deg).to_le_bytes());
        out[2..4].copy_from_slice(&deg_to_tenths(self.pitch_deg).to_le_bytes());
        out[4..6].copy_from_slice(&deg_to_tenths(self.roll_deg).to_le_bytes());
        out
    }

    /// Attitude assumed after `command` when the device did not confirm it.
    pub fn open_loop(command: AngleCommand, roll_deg: f64) -> Self {
        Self::new(command.yaw_deg(), command.pitch_deg(), roll_deg)
    }

    /// Absolute command that applies a relative correction to this attitude.
    pub fn offset_by(&self, offset: AngleOffset) -> AngleCommand {
        AngleCommand::clamped(
            self.yaw_deg + offset.pan_deg,
            self.pitch_deg + offset.tilt_deg,
        )
    }
}

/// Relative pan/tilt correction in degrees.
///
/// Positive pan turns right, positive tilt turns up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleOffset {
    pub pan_deg: f64,
    pub tilt_deg: f64,
}

impl AngleOffset {
    pub fn new(pan_deg: f64, tilt_deg: f64) -> Self {
        Self { pan_deg, tilt_deg }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clamp_out_of_range() {
        let cmd = AngleCommand::clamped(200.0, -999.0);
        assert_eq!(cmd.yaw_deg(), 135.0);
        assert_eq!(cmd.pitch_deg(), -90.0);

        let cmd = AngleCommand::clamped(-500.0, 80.0);
        assert_eq!(cmd.yaw_deg(), -135.0);
        assert_eq!(cmd.pitch_deg(), 45.0);
    }

    #[test]
    fn test_nan_becomes_zero() {
        let cmd = AngleCommand::clamped(f64::NAN, f64::NAN);
        assert_eq!(cmd.yaw_deg(), 0.0);
        assert_eq!(cmd.pitch_deg(), 0.0);
    }

    #[test]
    fn test_payload_encoding() {
        let cmd = AngleCommand::clamped(135.0, -90.0);
        assert_eq!(
            cmd.to_payload(),
            [
                1350i16.to_le_bytes()[0],
                1350i16.to_le_bytes()[1],
                (-900i16).to_le_bytes()[0],
                (-900i16).to_le_bytes()[1]
            ]
        );
    }

    #[test]
    fn test_payload_rounds_to_tenths() {
        let cmd = AngleCommand::clamped(12.34, -5.06);
        let decoded = AngleCommand::from_payload(&cmd.to_payload()).unwrap();
        assert_relative_eq!(decoded.yaw_deg(), 12.3, epsilon = 1e-9);
        assert_relative_eq!(decoded.pitch_deg(), -5.1, epsilon = 1e-9);
    }

    #[test]
    fn test_attitude_ignores_padding() {
        let mut payload = Attitude::new(-12.5, 3.0, 0.4).to_tenths_le().to_vec();
        payload.extend_from_slice(&[0xAA; 6]);
        let att = Attitude::from_tenths_le(&payload).unwrap();
        assert_relative_eq!(att.yaw_deg, -12.5, epsilon = 1e-9);
        assert_relative_eq!(att.pitch_deg, 3.0, epsilon = 1e-9);
        assert_relative_eq!(att.roll_deg, 0.4, epsilon = 1e-9);

        assert!(Attitude::from_tenths_le(&payload[..5]).is_none());
    }

    #[test]
    fn test_offset_applies_and_clamps() {
        let att = Attitude::new(130.0, 10.0, 0.0);
        let cmd = att.offset_by(AngleOffset::new(10.0, -5.0));
        assert_eq!(cmd.yaw_deg(), 135.0);
        assert_relative_eq!(cmd.pitch_deg(), 5.0);
    }
}
