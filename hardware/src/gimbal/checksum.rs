//! Checksum computation for gimbal frames
//!
//! Every frame ends with a CRC-16 over all preceding bytes (sync marker included),
//! stored little-endian. The algorithm is CRC-16/XMODEM: polynomial 0x1021,
//! MSB-first, initial value 0x0000, no reflection and no final XOR. The device
//! rejects anything that is not bit-for-bit this CRC.

use crc::{Crc, CRC_16_XMODEM};

/// CRC engine shared by the encoder and decoder.
pub const GIMBAL_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Size of the trailing checksum field in bytes.
pub const CHECKSUM_LEN: usize = 2;

/// Compute the frame checksum over `data`.
pub fn compute_checksum(data: &[u8]) -> u16 {
    GIMBAL_CRC.checksum(data)
}

/// Verify that a frame's trailing checksum is valid.
///
/// The frame should include all bytes up to and including the checksum.
/// Returns `false` for buffers too short to hold a checksum.
pub fn verify_checksum_bytes(frame: &[u8]) -> bool {
    if frame.len() <= CHECKSUM_LEN {
        return false;
    }

    let data_end = frame.len() - CHECKSUM_LEN;
    let computed = compute_checksum(&frame[..data_end]);
    let stored = u16::from_le_bytes([frame[data_end], frame[data_end + 1]]);

    computed == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit-at-a-time reference of the device CRC.
    fn reference_crc(data: &[u8]) -> u16 {
        let mut crc: u16 = 0x0000;
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x1021
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_standard_check_value() {
        assert_eq!(compute_checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_attitude_request_from_datasheet() {
        // Attitude request as listed in the device manual:
        // 55 66 01 00 00 00 00 0D E8 05
        let frame = [0x55, 0x66, 0x01, 0x00, 0x00, 0x00, 0x00, 0x0D, 0xE8, 0x05];
        assert_eq!(compute_checksum(&frame[..8]), 0x05E8);
        assert!(verify_checksum_bytes(&frame));
    }

    #[test]
    fn test_matches_bitwise_reference() {
        let samples: [&[u8]; 4] = [
            b"",
            &[0x00],
            &[0xFF, 0xFF, 0xFF],
            &[0x55, 0x66, 0x01, 0x04, 0x00, 0x07, 0x00, 0x0E, 0x46, 0x05, 0x7C, 0xFC],
        ];
        for sample in samples {
            assert_eq!(compute_checksum(sample), reference_crc(sample));
        }
    }

    #[test]
    fn test_verify_rejects_short_and_corrupt() {
        assert!(!verify_checksum_bytes(&[]));
        assert!(!verify_checksum_bytes(&[0x00, 0x00]));

        let mut frame = [0x55, 0x66, 0x01, 0x00, 0x00, 0x00, 0x00, 0x0D, 0xE8, 0x05];
        frame[8] = 0x00;
        assert!(!verify_checksum_bytes(&frame));
    }
}
