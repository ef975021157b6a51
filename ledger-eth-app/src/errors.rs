// SPDX-License-Identifier: Apache-2.0

//! Error types for Ethereum application

use ledger_device_base::LedgerAppError;
use ledger_transport::APDUErrorCode;
use thiserror::Error;

use crate::etherscan::RawTransactionError;

/// Ethereum application specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EthAppError<E: std::error::Error> {
    /// Error from the underlying transport/device
    #[error("Transport error: {0}")]
    Transport(#[from] LedgerAppError<E>),

    /// Invalid BIP32 derivation path
    #[error("Invalid BIP32 path: {0}")]
    InvalidBip32Path(String),

    /// Invalid Ethereum address format
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    /// Invalid signature format
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid transaction format
    #[error("Invalid transaction format: {0}")]
    InvalidTransaction(String),

    /// Explorer transaction could not be converted
    #[error(transparent)]
    RawTransaction(#[from] RawTransactionError),

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Invalid response data from device
    #[error("Invalid response data: {0}")]
    InvalidResponseData(String),
}

impl<E: std::error::Error> EthAppError<E> {
    /// Status word of a device rejection, e.g. `0x6a80` when blind signing is disabled
    pub fn status_word(&self) -> Option<u16> {
        match self {
            EthAppError::Transport(err) => err.status_word(),
            _ => None,
        }
    }

    /// Check if error is due to user rejection
    pub fn is_user_rejected(&self) -> bool {
        self.status_word() == Some(APDUErrorCode::ConditionsNotSatisfied as u16)
    }

    /// Check if error is due to transport/communication issues
    pub fn is_transport_error(&self) -> bool {
        matches!(self, EthAppError::Transport(LedgerAppError::Transport(_)))
    }

    /// Check if error is due to invalid input parameters
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EthAppError::InvalidBip32Path(_)
                | EthAppError::InvalidAddress(_)
                | EthAppError::InvalidTransaction(_)
                | EthAppError::RawTransaction(_)
                | EthAppError::InvalidMessage(_)
        )
    }
}

/// Result type alias for Ethereum application operations
pub type EthAppResult<T, E> = Result<T, EthAppError<E>>;
