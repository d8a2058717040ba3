//! Gimbal wire frame encoding and decoding
//!
//! Frame layout (all multi-byte fields little-endian):
//!
//! ```text
//! offset  size  field
//! 0       2     sync marker 0x55 0x66
//! 2       1     ctrl (bit0 = ack requested, bit1 = is ack)
//! 3       2     payload length
//! 5       2     sequence number
//! 7       1     command id
//! 8       n     payload
//! 8+n     2     CRC-16/XMODEM over bytes 0..8+n
//! ```
//!
//! Decoding never trusts a partially valid buffer: anything that fails the sync,
//! length or checksum checks is reported as a [`DecodeError`] and must be dropped.

use bitflags::bitflags;
use thiserror::Error;

use super::checksum::{compute_checksum, CHECKSUM_LEN};

/// Fixed two-byte marker at the start of every frame.
pub const SYNC: [u8; 2] = [0x55, 0x66];

/// Bytes before the payload: sync, ctrl, length, sequence, command id.
pub const HEADER_LEN: usize = 8;

/// Smallest valid frame: header plus checksum, empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

bitflags! {
    /// Frame control byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Ctrl: u8 {
        /// Sender asks the receiver to acknowledge this frame
        const ACK_REQUESTED = 0x01;
        /// This frame is an acknowledgement
        const IS_ACK = 0x02;
    }
}

/// Reasons a buffer is not a valid frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Buffer too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Bad sync marker: {0:02X?}")]
    BadSync([u8; 2]),

    #[error("Checksum mismatch: stored 0x{stored:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch { stored: u16, computed: u16 },

    #[error("Declared payload length {declared} exceeds available {available} bytes")]
    LengthOverrun { declared: usize, available: usize },
}

/// Reasons a frame cannot be serialized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload of {len} bytes exceeds the 65535 byte length field")]
    PayloadTooLarge { len: usize },
}

/// A decoded gimbal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub ctrl: Ctrl,
    pub sequence: u16,
    pub command_id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame; `ack_requested` sets the corresponding ctrl bit.
    pub fn new(command_id: u8, payload: &[u8], sequence: u16, ack_requested: bool) -> Self {
        let ctrl = if ack_requested {
            Ctrl::ACK_REQUESTED
        } else {
            Ctrl::empty()
        };
        Self {
            ctrl,
            sequence,
            command_id,
            payload: payload.to_vec(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ctrl.contains(Ctrl::IS_ACK)
    }

    pub fn ack_requested(&self) -> bool {
        self.ctrl.contains(Ctrl::ACK_REQUESTED)
    }

    /// Serialize to wire bytes, checksum included.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let len = u16::try_from(self.payload.len()).map_err(|_| EncodeError::PayloadTooLarge {
            len: self.payload.len(),
        })?;

        let mut bytes = Vec::with_capacity(MIN_FRAME_LEN + self.payload.len());
        bytes.extend_from_slice(&SYNC);
        bytes.push(self.ctrl.bits());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&self.sequence.to_le_bytes());
        bytes.push(self.command_id);
        bytes.extend_from_slice(&self.payload);

        let crc = compute_checksum(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        Ok(bytes)
    }
}

/// Build the wire bytes for one command.
pub fn encode(
    command_id: u8,
    payload: &[u8],
    sequence: u16,
    ack_requested: bool,
) -> Result<Vec<u8>, EncodeError> {
    Frame::new(command_id, payload, sequence, ack_requested).encode()
}

/// Parse a received datagram.
///
/// The checksum is taken from the last two bytes of the buffer and must cover
/// everything before it. The payload is exactly the declared length; a declared
/// length that would run into the checksum is rejected.
pub fn decode(raw: &[u8]) -> Result<Frame, DecodeError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort { len: raw.len() });
    }
    if raw[0..2] != SYNC {
        return Err(DecodeError::BadSync([raw[0], raw[1]]));
    }

    let data_end = raw.len() - CHECKSUM_LEN;
    let stored = u16::from_le_bytes([raw[data_end], raw[data_end + 1]]);
    let computed = compute_checksum(&raw[..data_end]);
    if stored != computed {
        return Err(DecodeError::ChecksumMismatch { stored, computed });
    }

    let ctrl = Ctrl::from_bits_retain(raw[2]);
    let declared = u16::from_le_bytes([raw[3], raw[4]]) as usize;
    let sequence = u16::from_le_bytes([raw[5], raw[6]]);
    let command_id = raw[7];

    let available = data_end - HEADER_LEN;
    if declared > available {
        return Err(DecodeError::LengthOverrun {
            declared,
            available,
        });
    }

    Ok(Frame {
        ctrl,
        sequence,
        command_id,
        payload: raw[HEADER_LEN..HEADER_LEN + declared].to_vec(),
    })
}
