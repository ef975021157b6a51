// SPDX-License-Identifier: Apache-2.0

use std::{io, path::PathBuf, time::Duration};

use ledger_apdu::{APDUDecodeError, APDUErrorCode};
use ledger_transport_speculos::LedgerTcpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    Config(String),

    #[error("Failed to launch `{}`: {source}", .bin.display())]
    Launch {
        bin: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Emulator exited before it was ready ({0})")]
    EmulatorExited(String),

    #[error("Emulator did not show `{text}` within {timeout:?}")]
    StartTimeout { text: String, timeout: Duration },

    #[error("Screen did not change within {0:?}")]
    ScreenUnchanged(Duration),

    #[error("Scenario did not finish within {0:?}")]
    TestTimeout(Duration),

    #[error(transparent)]
    Transport(#[from] LedgerTcpError),

    #[error("Invalid APDU: {0}")]
    Decode(#[from] APDUDecodeError),

    /// Device answered with a status word other than `0x9000`
    #[error("Device rejected the command: {status_word:#06x} ({description})")]
    Status {
        status_word: u16,
        description: String,
    },

    #[error("Emulator API: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Emulator API returned {status} for {url}")]
    ApiStatus { url: String, status: u16 },

    #[error("Screenshot: {0}")]
    Image(#[from] image::ImageError),

    #[error("Missing reference snapshot {}", .0.display())]
    MissingSnapshot(PathBuf),

    #[error("Snapshot {} differs from {}", .captured.display(), .golden.display())]
    SnapshotMismatch { captured: PathBuf, golden: PathBuf },

    #[error("Io: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Rejection from a raw status word
    pub fn from_status_word(status_word: u16) -> Self {
        let description = match APDUErrorCode::try_from(status_word) {
            Ok(code) => code.description(),
            Err(_) => "unknown status word".to_string(),
        };
        SessionError::Status {
            status_word,
            description,
        }
    }

    /// Status word carried by a device rejection
    pub fn status_word(&self) -> Option<u16> {
        match self {
            SessionError::Status { status_word, .. } => Some(*status_word),
            _ => None,
        }
    }
}
