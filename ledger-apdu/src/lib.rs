// SPDX-License-Identifier: Apache-2.0

//! APDU types for Ledger device communication
//!
//! An APDU command is `CLA INS P1 P2 Lc DATA`; an answer is `DATA SW1 SW2`.
//! Besides the command/answer containers this crate knows the status words
//! returned by the Ethereum application and can decode a command from the
//! hex notation used by test fixtures and replay files.

#![no_std]
#![deny(unused_import_braces, unused_qualifications)]

extern crate no_std_compat as std;

#[cfg(test)]
extern crate alloc;

use core::ops::Deref;
use snafu::prelude::*;
use std::convert::TryFrom;
use std::string::{String, ToString};
use std::vec::Vec;

mod decode;

pub use decode::APDUDecodeError;

/// Size of the `CLA INS P1 P2 Lc` header
pub const APDU_HEADER_SIZE: usize = 5;

/// Maximum payload carried by a short APDU
pub const APDU_MAX_DATA_SIZE: usize = 255;

/// An APDU command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDUCommand<B> {
    /// Instruction class
    pub cla: u8,
    /// Instruction code
    pub ins: u8,
    /// First parameter
    pub p1: u8,
    /// Second parameter
    pub p2: u8,
    /// Payload
    pub data: B,
}

impl<B> APDUCommand<B>
where
    B: Deref<Target = [u8]>,
{
    /// Serialize the command as `CLA INS P1 P2 Lc DATA`
    ///
    /// Lc is a single byte: payloads longer than [`APDU_MAX_DATA_SIZE`] must be
    /// chunked by the caller before reaching this point.
    pub fn serialize(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(APDU_HEADER_SIZE + self.data.len());
        v.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, self.data.len() as u8]);
        v.extend_from_slice(&self.data);
        v
    }

    /// Hex representation of the serialized command
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }
}

/// An APDU answer: payload followed by a 2-byte status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDUAnswer<B> {
    data: B,
    retcode: u16,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
/// Error interpreting bytes as an APDU answer
pub enum APDUAnswerError {
    #[snafu(display("answer too short (< 2 bytes)"))]
    /// Passed APDU answer was less than the minimum 2 bytes required for the return code
    TooShort,
}

impl<B> APDUAnswer<B>
where
    B: Deref<Target = [u8]>,
{
    /// Attempt to interpret the given slice as an APDU answer
    pub fn from_answer(answer: B) -> Result<Self, APDUAnswerError> {
        ensure!(answer.len() >= 2, TooShortSnafu);
        let retcode = arrayref::array_ref!(answer, answer.len() - 2, 2);
        let retcode = u16::from_be_bytes(*retcode);

        Ok(APDUAnswer {
            data: answer,
            retcode,
        })
    }

    /// Returns the answer payload, without the status word
    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data.len() - 2]
    }

    /// Returns the raw status word
    #[inline(always)]
    pub fn retcode(&self) -> u16 {
        self.retcode
    }

    /// Attempt to map the status word to a known [`APDUErrorCode`]
    ///
    /// The raw status word is returned when it is not recognized.
    #[inline(always)]
    pub fn error_code(&self) -> Result<APDUErrorCode, u16> {
        APDUErrorCode::try_from(self.retcode).map_err(|_| self.retcode)
    }

    /// Whether the device reported `0x9000`
    pub fn is_success(&self) -> bool {
        self.retcode == APDUErrorCode::NoError as u16
    }

    /// Returns the full answer, status word included
    pub fn apdu_data(&self) -> &[u8] {
        &self.data[..]
    }
}

macro_rules! status_words {
    ($( $(#[$doc:meta])* $name:ident = $value:literal => $desc:literal, )+) => {
        /// Status words returned by the Ethereum application and the OS
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum APDUErrorCode {
            $( $(#[$doc])* $name = $value, )+
        }

        impl TryFrom<u16> for APDUErrorCode {
            type Error = ();

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$name), )+
                    _ => Err(()),
                }
            }
        }

        impl APDUErrorCode {
            /// Human readable description of the status word
            pub fn description(&self) -> String {
                let desc = match self {
                    $( Self::$name => $desc, )+
                };
                desc.to_string()
            }
        }
    };
}

status_words! {
    /// Success
    NoError = 0x9000 => "[APDU_CODE_OK]",
    /// Operation not permitted in the current mode
    ModeCheckFailed = 0x6001 => "[APDU_CODE_MODE_CHECK_FAILED] Mode check failed",
    /// Transaction type not supported
    TxTypeNotSupported = 0x6501 => "[APDU_CODE_TX_TYPE_NOT_SUPPORTED] Transaction type not supported",
    /// Output buffer too small for the chain id
    ChainIdBufferTooSmall = 0x6502 => "[APDU_CODE_CHAINID_OUT_BUF_SMALL] Chain id output buffer too small",
    /// Internal error
    InternalError = 0x6800 => "[APDU_CODE_INTERNAL_ERROR] Internal error",
    /// Raised by the OS when the application stops (e.g. an amount it cannot represent)
    AppStopped = 0x6807 => "[APDU_CODE_APP_STOPPED] Application stopped",
    /// Security status not satisfied
    SecurityNotSatisfied = 0x6982 => "[APDU_CODE_SECURITY_NOT_SATISFIED] Security status not satisfied",
    /// Wrong data length
    WrongDataLength = 0x6983 => "[APDU_CODE_WRONG_DATA_LENGTH] Wrong data length",
    /// Plugin not installed
    PluginNotInstalled = 0x6984 => "[APDU_CODE_PLUGIN_NOT_INSTALLED] Plugin not installed",
    /// Conditions of use not satisfied (rejected by user, missing context)
    ConditionsNotSatisfied = 0x6985 => "[APDU_CODE_CONDITIONS_NOT_SATISFIED] Conditions not satisfied",
    /// Error without further information
    ErrorNoInfo = 0x6a00 => "[APDU_CODE_ERROR_NO_INFO] Error without info",
    /// Invalid data (also returned when blind signing or contract data is disabled)
    InvalidData = 0x6a80 => "[APDU_CODE_INVALID_DATA] Invalid data",
    /// Not enough memory
    InsufficientMemory = 0x6a84 => "[APDU_CODE_INSUFFICIENT_MEMORY] Insufficient memory",
    /// Referenced data not found
    ReferencedDataNotFound = 0x6a88 => "[APDU_CODE_REF_DATA_NOT_FOUND] Referenced data not found",
    /// Wrong P1 or P2
    InvalidP1P2 = 0x6b00 => "[APDU_CODE_INVALID_P1P2] Invalid P1/P2",
    /// Instruction not supported
    InsNotSupported = 0x6d00 => "[APDU_CODE_INS_NOT_SUPPORTED] Instruction not supported",
    /// Class not supported
    ClaNotSupported = 0x6e00 => "[APDU_CODE_CLA_NOT_SUPPORTED] CLA not supported",
    /// Unknown error
    Unknown = 0x6f00 => "[APDU_CODE_UNKNOWN] Unknown",
}
