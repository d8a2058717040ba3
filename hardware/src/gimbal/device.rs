//! High-level gimbal driver
//!
//! Typed attitude and angle commands on top of a [`CommandChannel`].
//!
//! # Example
//!
//! ```no_run
//! use hardware::gimbal::Gimbal;
//!
//! let mut gimbal = Gimbal::connect_ip("192.168.144.25")?;
//! if let Some(att) = gimbal.read_attitude()? {
//!     println!("yaw={:+.1} pitch={:+.1}", att.yaw_deg, att.pitch_deg);
//! }
//!
//! // Out of range requests are clamped, never rejected.
//! let report = gimbal.set_angles_with_retry(200.0, -10.0, 3)?;
//! println!("sent yaw={:+.1}", report.sent.yaw_deg());
//! # Ok::<(), hardware::gimbal::GimbalError>(())
//! ```

use std::net::ToSocketAddrs;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::angle::{AngleCommand, Attitude};
use super::channel::{CommandChannel, ReplyFilter, RequestOutcome, DEFAULT_PORT};
use super::GimbalResult;

/// Command id: read platform attitude (no payload).
pub const CMD_ATTITUDE: u8 = 0x0D;

/// Command id: set absolute yaw/pitch.
pub const CMD_SET_ANGLES: u8 = 0x0E;

/// Attitude replies carry yaw, pitch, roll and three rate words.
pub const ATTITUDE_REPLY_LEN: usize = 12;

/// Angle-set acknowledgements carry the resulting yaw, pitch, roll.
pub const SET_ANGLES_ACK_LEN: usize = 6;

/// What an angle command actually did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetAnglesReport {
    /// The clamped command that went on the wire
    pub sent: AngleCommand,
    /// Attitude confirmed by the device, `None` if no ack arrived
    pub confirmed: Option<Attitude>,
}

impl SetAnglesReport {
    pub fn acked(&self) -> bool {
        self.confirmed.is_some()
    }
}

/// Interface for two-axis gimbal control.
///
/// Abstracts the platform for the actuation worker and for tests.
pub trait GimbalInterface {
    /// Read the current attitude; `Ok(None)` when the device did not answer.
    fn read_attitude(&mut self) -> GimbalResult<Option<Attitude>>;

    /// Command an absolute attitude, retrying up to `attempts` times on timeout.
    fn command_angles(
        &mut self,
        command: AngleCommand,
        attempts: usize,
    ) -> GimbalResult<SetAnglesReport>;
}

/// Driver for a UDP-controlled two-axis gimbal.
pub struct Gimbal {
    channel: CommandChannel,
}

impl Gimbal {
    /// Connect to a gimbal at the given address (`ip:port`).
    pub fn connect<A: ToSocketAddrs>(addr: A) -> GimbalResult<Self> {
        let channel = CommandChannel::connect(addr)?;
        Ok(Self::from_channel(channel))
    }

    /// Connect to a gimbal at `ip` on the default port.
    pub fn connect_ip(ip: &str) -> GimbalResult<Self> {
        info!("Connecting to gimbal at {ip}:{DEFAULT_PORT}");
        Self::connect(format!("{ip}:{DEFAULT_PORT}"))
    }

    pub fn from_channel(channel: CommandChannel) -> Self {
        Self { channel }
    }

    /// Set the per-attempt acknowledgement timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.channel.set_timeout(timeout);
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Read yaw/pitch/roll.
    ///
    /// The device answers attitude requests either as an ack or as a plain
    /// stream frame, so any frame with the attitude command id and at least
    /// [`ATTITUDE_REPLY_LEN`] bytes is accepted.
    pub fn read_attitude(&mut self) -> GimbalResult<Option<Attitude>> {
        let reply = ReplyFilter::reply(CMD_ATTITUDE, ATTITUDE_REPLY_LEN);
        match self.channel.exchange(CMD_ATTITUDE, &[], Some(reply))? {
            RequestOutcome::Acked(payload) => Ok(Attitude::from_tenths_le(&payload)),
            _ => Ok(None),
        }
    }

    /// Send one angle command (clamped to the hardware range) and wait for its ack.
    pub fn set_angles(&mut self, yaw_deg: f64, pitch_deg: f64) -> GimbalResult<SetAnglesReport> {
        self.send_angles(AngleCommand::clamped(yaw_deg, pitch_deg))
    }

    /// Like [`set_angles`](Self::set_angles), resending with a fresh sequence
    /// number until acknowledged or `attempts` are used up.
    pub fn set_angles_with_retry(
        &mut self,
        yaw_deg: f64,
        pitch_deg: f64,
        attempts: usize,
    ) -> GimbalResult<SetAnglesReport> {
        self.command_angles(AngleCommand::clamped(yaw_deg, pitch_deg), attempts)
    }

    fn send_angles(&mut self, command: AngleCommand) -> GimbalResult<SetAnglesReport> {
        let reply = ReplyFilter::ack(CMD_SET_ANGLES).with_min_payload(SET_ANGLES_ACK_LEN);
        let outcome = self
            .channel
            .exchange(CMD_SET_ANGLES, &command.to_payload(), Some(reply))?;

        let confirmed = match outcome {
            RequestOutcome::Acked(payload) => Attitude::from_tenths_le(&payload),
            _ => None,
        };
        Ok(SetAnglesReport {
            sent: command,
            confirmed,
        })
    }
}

impl GimbalInterface for Gimbal {
    fn read_attitude(&mut self) -> GimbalResult<Option<Attitude>> {
        Gimbal::read_attitude(self)
    }

    fn command_angles(
        &mut self,
        command: AngleCommand,
        attempts: usize,
    ) -> GimbalResult<SetAnglesReport> {
        let attempts = attempts.max(1);
        let mut report = self.send_angles(command)?;
        for attempt in 2..=attempts {
            if report.acked() {
                break;
            }
            debug!("Angle command unacknowledged, attempt {attempt}/{attempts}");
            report = self.send_angles(command)?;
        }
        if !report.acked() {
            warn!(
                "No ack for yaw={:+.1} pitch={:+.1} after {attempts} attempt(s)",
                command.yaw_deg(),
                command.pitch_deg()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gimbal::frame::{self, Ctrl, Frame};
    use approx::assert_relative_eq;
    use std::net::UdpSocket;

    fn loopback(timeout: Duration) -> (Gimbal, UdpSocket) {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut gimbal = Gimbal::connect(device.local_addr().unwrap()).unwrap();
        gimbal.set_timeout(timeout);
        (gimbal, device)
    }

    #[test]
    fn test_set_angles_transmits_clamped_values() {
        let (mut gimbal, device) = loopback(Duration::from_millis(20));
        let report = gimbal.set_angles(200.0, -999.0).unwrap();
        assert_eq!(report.sent.yaw_deg(), 135.0);
        assert_eq!(report.sent.pitch_deg(), -90.0);
        assert!(!report.acked());

        let mut buf = [0u8; 64];
        let n = device.recv(&mut buf).unwrap();
        let sent = frame::decode(&buf[..n]).unwrap();
        assert_eq!(sent.command_id, CMD_SET_ANGLES);
        let decoded = AngleCommand::from_payload(&sent.payload).unwrap();
        assert_relative_eq!(decoded.yaw_deg(), 135.0);
        assert_relative_eq!(decoded.pitch_deg(), -90.0);
    }

    #[test]
    fn test_read_attitude_accepts_stream_reply() {
        let (mut gimbal, device) = loopback(Duration::from_millis(500));
        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, peer) = device.recv_from(&mut buf).unwrap();
            let request = frame::decode(&buf[..n]).unwrap();
            assert_eq!(request.command_id, CMD_ATTITUDE);
            assert!(request.payload.is_empty());

            let mut payload = Attitude::new(10.5, -20.0, 0.3).to_tenths_le().to_vec();
            // Short reply first: must be ignored
            device
                .send_to(&frame::encode(CMD_ATTITUDE, &payload, 0, false).unwrap(), peer)
                .unwrap();
            payload.extend_from_slice(&[0u8; 6]);
            device
                .send_to(&frame::encode(CMD_ATTITUDE, &payload, 0, false).unwrap(), peer)
                .unwrap();
        });

        let att = gimbal.read_attitude().unwrap().unwrap();
        responder.join().unwrap();
        assert_relative_eq!(att.yaw_deg, 10.5, epsilon = 1e-9);
        assert_relative_eq!(att.pitch_deg, -20.0, epsilon = 1e-9);
        assert_relative_eq!(att.roll_deg, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_retry_uses_fresh_sequence_and_stops_on_ack() {
        let (mut gimbal, device) = loopback(Duration::from_millis(100));
        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            // Drop the first attempt, ack the second.
            let (n, _) = device.recv_from(&mut buf).unwrap();
            let first = frame::decode(&buf[..n]).unwrap();
            let (n, peer) = device.recv_from(&mut buf).unwrap();
            let second = frame::decode(&buf[..n]).unwrap();
            assert_eq!(second.sequence, first.sequence.wrapping_add(1));

            let mut ack = Frame::new(
                CMD_SET_ANGLES,
                &Attitude::new(5.0, -3.0, 0.0).to_tenths_le(),
                second.sequence,
                false,
            );
            ack.ctrl = Ctrl::IS_ACK;
            device.send_to(&ack.encode().unwrap(), peer).unwrap();
        });

        let report = gimbal.set_angles_with_retry(5.0, -3.0, 3).unwrap();
        responder.join().unwrap();
        let confirmed = report.confirmed.unwrap();
        assert_relative_eq!(confirmed.yaw_deg, 5.0, epsilon = 1e-9);
        assert_relative_eq!(confirmed.pitch_deg, -3.0, epsilon = 1e-9);
        assert_eq!(gimbal.channel().peek_sequence(), 2);
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let (mut gimbal, _device) = loopback(Duration::from_millis(10));
        let report = gimbal.set_angles_with_retry(0.0, 0.0, 3).unwrap();
        assert!(!report.acked());
        assert_eq!(gimbal.channel().peek_sequence(), 3);
    }
}
