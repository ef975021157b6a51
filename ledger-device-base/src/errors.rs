// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors shared by every Ledger application client
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LedgerAppError<E: std::error::Error> {
    /// The answer does not start with the expected format byte
    #[error("Unexpected format ID")]
    InvalidFormatID,
    /// Answer payload is shorter than its own length fields announce
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// A string field is not valid UTF-8
    #[error("UTF8 conversion error")]
    Utf8,
    /// Device answered 0x9000 without the expected signature
    #[error("No signature has been returned")]
    NoSignature,
    /// Transport error
    #[error("Ledger transport error")]
    Transport(#[from] E),
    /// Known status word other than 0x9000
    #[error("App Error: | {0} {1}")]
    AppSpecific(u16, String),
    /// Status word not known to this crate
    #[error("Unknown error: {0:#06x}")]
    Unknown(u16),
}

impl<E: std::error::Error> LedgerAppError<E> {
    /// Status word reported by the device, if the error came from one
    pub fn status_word(&self) -> Option<u16> {
        match self {
            LedgerAppError::AppSpecific(sw, _) | LedgerAppError::Unknown(sw) => Some(*sw),
            _ => None,
        }
    }
}
