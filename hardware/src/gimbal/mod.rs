//! Two-axis gimbal control over UDP
//!
//! The gimbal speaks a small binary protocol over datagrams. This module is split
//! into layers:
//!
//! - [`checksum`] - CRC-16/XMODEM used to seal every frame
//! - [`frame`] - frame encode/decode (sync, ctrl, length, sequence, command id)
//! - [`channel`] - one socket, sequence numbering, single-attempt request/ack
//! - [`device`] - typed attitude read and angle set, caller-side retry
//! - [`worker`] - background thread that keeps gimbal round trips off the video loop
//!
//! Malformed or checksum-invalid datagrams never surface as errors; a lossy
//! link shared with telemetry streams is expected to carry them.

pub mod angle;
pub mod channel;
pub mod checksum;
pub mod device;
pub mod frame;
pub mod worker;

use thiserror::Error;

pub use angle::{AngleCommand, AngleOffset, Attitude, PITCH_RANGE_DEG, YAW_RANGE_DEG};
pub use channel::{
    CommandChannel, ReplyFilter, RequestOutcome, DEFAULT_ACK_TIMEOUT, DEFAULT_GIMBAL_IP,
    DEFAULT_PORT,
};
pub use checksum::{compute_checksum, verify_checksum_bytes};
pub use device::{Gimbal, GimbalInterface, SetAnglesReport, CMD_ATTITUDE, CMD_SET_ANGLES};
pub use frame::{decode, encode, Ctrl, DecodeError, EncodeError, Frame};
pub use worker::GimbalWorker;

/// Errors that can occur during gimbal communication.
///
/// Acknowledgement timeouts are not errors; they are reported as
/// [`RequestOutcome::TimedOut`].
#[derive(Error, Debug)]
pub enum GimbalError {
    /// Low-level I/O error (socket send/receive failure).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind or connect the datagram socket.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Command could not be framed; nothing was sent.
    #[error("Encode error: {0}")]
    Encode(#[from] frame::EncodeError),
}

/// Result type for gimbal operations.
pub type GimbalResult<T> = Result<T, GimbalError>;
