// SPDX-License-Identifier: Apache-2.0

//! Decoding of hex-encoded APDU commands

use snafu::prelude::*;
use std::vec::Vec;

use crate::{APDUCommand, APDU_HEADER_SIZE, APDU_MAX_DATA_SIZE};

/// Error decoding a hex-encoded APDU command
#[derive(Debug, Snafu, PartialEq)]
pub enum APDUDecodeError {
    #[snafu(display("invalid hex in APDU: {reason}"))]
    /// The string is not valid hex (odd length or a non-hex character)
    InvalidHex {
        /// Underlying hex error
        reason: hex::FromHexError,
    },

    #[snafu(display("APDU too short: {len} bytes (expected at least 5)"))]
    /// Fewer bytes than the `CLA INS P1 P2 Lc` header
    TooShort {
        /// Number of decoded bytes
        len: usize,
    },

    #[snafu(display("APDU payload too long: {len} bytes (at most 255)"))]
    /// The payload does not fit the single Lc byte
    TooLong {
        /// Number of payload bytes following the header
        len: usize,
    },

    #[snafu(display("APDU length byte mismatch: declared {declared}, actual {actual}"))]
    /// Lc does not match the payload length
    LengthMismatch {
        /// Lc as found in the header
        declared: u8,
        /// Number of payload bytes following the header
        actual: usize,
    },
}

fn decode_hex(input: &str) -> Result<Vec<u8>, APDUDecodeError> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    hex::decode(input).map_err(|reason| APDUDecodeError::InvalidHex { reason })
}

impl APDUCommand<Vec<u8>> {
    /// Decode a command from its hex notation, `CLA INS P1 P2 Lc DATA`
    ///
    /// The Lc byte is skipped and not compared to the payload length; use
    /// [`APDUCommand::from_hex_checked`] to enforce it.
    pub fn from_hex(input: &str) -> Result<Self, APDUDecodeError> {
        let bytes = decode_hex(input)?;
        Self::from_bytes(&bytes)
    }

    /// Same as [`APDUCommand::from_hex`], but Lc must equal the payload length
    pub fn from_hex_checked(input: &str) -> Result<Self, APDUDecodeError> {
        let bytes = decode_hex(input)?;
        let command = Self::from_bytes(&bytes)?;

        let declared = bytes[APDU_HEADER_SIZE - 1];
        ensure!(
            declared as usize == command.data.len(),
            LengthMismatchSnafu {
                declared,
                actual: command.data.len(),
            }
        );

        Ok(command)
    }

    /// Split raw bytes into header fields and payload, ignoring Lc
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, APDUDecodeError> {
        ensure!(
            bytes.len() >= APDU_HEADER_SIZE,
            TooShortSnafu { len: bytes.len() }
        );

        let len = bytes.len() - APDU_HEADER_SIZE;
        ensure!(len <= APDU_MAX_DATA_SIZE, TooLongSnafu { len });

        Ok(APDUCommand {
            cla: bytes[0],
            ins: bytes[1],
            p1: bytes[2],
            p2: bytes[3],
            data: bytes[APDU_HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, vec};

    const SET_PLUGIN: &str = "e01600007301010645524337323160f80121c31a0d46b5279700f9df786054aa5ee542842e0e0000000000000001000147304502202e2282d7d3ea714da283010f517af469e1d59654aaee0fc438f017aa557eaea50221008b369679381065bbe01135723a4f9adb229295017d37c4d30138b90a51cf6ab6";

    #[test]
    fn decodes_set_plugin_fixture() {
        let command = APDUCommand::from_hex(SET_PLUGIN).unwrap();
        assert_eq!(command.cla, 0xe0);
        assert_eq!(command.ins, 0x16);
        assert_eq!(command.p1, 0x00);
        assert_eq!(command.p2, 0x00);
        assert_eq!(command.data.len(), SET_PLUGIN.len() / 2 - 5);
        assert_eq!(&command.data[..4], &[0x01, 0x01, 0x06, 0x45]);
    }

    #[test]
    fn decoding_is_deterministic() {
        let first = APDUCommand::from_hex(SET_PLUGIN).unwrap();
        let second = APDUCommand::from_hex(SET_PLUGIN).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn length_byte_is_not_validated() {
        // Lc says 0x10 but only two bytes follow
        let command = APDUCommand::from_hex("e004800010aabb").unwrap();
        assert_eq!(command.p1, 0x80);
        assert_eq!(command.data, vec![0xaa, 0xbb]);
    }

    #[test]
    fn checked_decoding_rejects_wrong_length_byte() {
        let err = APDUCommand::from_hex_checked("e004800010aabb").unwrap_err();
        assert_eq!(
            err,
            APDUDecodeError::LengthMismatch {
                declared: 0x10,
                actual: 2
            }
        );

        let command = APDUCommand::from_hex_checked(SET_PLUGIN).unwrap();
        assert_eq!(command.data.len(), 0x73);
    }

    #[test]
    fn header_only_command_has_empty_payload() {
        let command = APDUCommand::from_hex("0xE006000000").unwrap();
        assert_eq!(command.ins, 0x06);
        assert!(command.data.is_empty());
    }

    #[test]
    fn malformed_hex_is_an_error() {
        assert!(matches!(
            APDUCommand::from_hex("e00400000"),
            Err(APDUDecodeError::InvalidHex { .. })
        ));
        assert!(matches!(
            APDUCommand::from_hex("e0040000zz"),
            Err(APDUDecodeError::InvalidHex { .. })
        ));
        assert_eq!(
            APDUCommand::from_hex("e0040000"),
            Err(APDUDecodeError::TooShort { len: 4 })
        );
    }

    #[test]
    fn payload_must_fit_the_length_byte() {
        let longest = format!("e0040000ff{}", "ab".repeat(255));
        assert_eq!(APDUCommand::from_hex(&longest).unwrap().data.len(), 255);

        let too_long = format!("e0040000ff{}", "ab".repeat(300));
        assert_eq!(
            APDUCommand::from_hex(&too_long),
            Err(APDUDecodeError::TooLong { len: 300 })
        );
    }

    #[test]
    fn serialize_after_decode_restores_length_byte() {
        let command = APDUCommand::from_hex(SET_PLUGIN).unwrap();
        assert_eq!(command.to_hex(), SET_PLUGIN);
    }
}
