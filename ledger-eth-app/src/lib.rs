// SPDX-License-Identifier: Apache-2.0

//! Ledger Ethereum Application client
//!
//! Talks to the Ethereum application of a Ledger device or emulator through
//! any [`Exchange`] transport.
//!
//! ## Features
//!
//! - **Core Operations**: Get addresses, sign transactions, sign personal messages
//! - **Configuration**: Query application configuration (blind signing flag, version)
//! - **Explorer replay**: Re-sign a signed transaction copied from a block explorer
//!   through [`EtherscanAdapter`]
//! - **Chunked Operations**: 150-byte chunks, never splitting the EIP-155 trailer
//! - **Large chain ids**: full `v` rebuilt from the single byte the device returns

use ledger_transport::Exchange;

pub mod commands;
pub mod errors;
pub mod etherscan;
pub mod instructions;
pub mod rlp;
pub mod types;
pub mod utils;

pub use commands::*;
pub use errors::*;
pub use etherscan::{EtherscanAdapter, RawTransactionError, DEFAULT_LEGACY_CHAIN_ID};
pub use types::*;

use ledger_device_base::App;

/// Ethereum app marker implementing `App` trait CLA.
#[derive(Debug, Clone)]
pub struct EthApp;

impl App for EthApp {
    /// CLA for Ethereum app on Ledger (0xE0)
    const CLA: u8 = 0xE0;
}

/// High-level Ethereum application client
///
/// Wraps a transport; pass `&transport` to keep ownership of the connection.
#[derive(Debug)]
pub struct EthereumApp<E: Exchange> {
    transport: E,
    adapter: EtherscanAdapter,
}

impl<E: Exchange> EthereumApp<E> {
    /// Create a new Ethereum application client
    pub fn new(transport: E) -> Self {
        Self {
            transport,
            adapter: EtherscanAdapter::default(),
        }
    }

    /// Adapter used by [`EthereumApp::sign_etherscan_transaction`]
    pub fn with_adapter(mut self, adapter: EtherscanAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &E {
        &self.transport
    }
}

impl<E> EthereumApp<E>
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    /// Get Ethereum public address for the given BIP 32 path
    pub async fn get_address(
        &self,
        params: GetAddressParams,
    ) -> EthAppResult<PublicKeyInfo, E::Error> {
        EthApp::get_address(&self.transport, params).await
    }

    /// Get Ethereum application configuration
    pub async fn get_configuration(&self) -> EthAppResult<AppConfiguration, E::Error> {
        EthApp::get_configuration(&self.transport).await
    }

    /// Sign an Ethereum personal message
    ///
    /// The message is displayed on the device for user confirmation.
    pub async fn sign_personal_message(
        &self,
        params: SignMessageParams,
    ) -> EthAppResult<Signature, E::Error> {
        EthApp::sign_personal_message(&self.transport, params).await
    }

    /// Sign an unsigned serialized transaction
    ///
    /// # Arguments
    ///
    /// * `path` - derivation path such as `44'/60'/1'/0/0`
    /// * `raw_tx` - unsigned transaction as hex, optional type byte then RLP list
    pub async fn sign_transaction(
        &self,
        path: &str,
        raw_tx: &str,
    ) -> EthAppResult<TransactionSignature, E::Error> {
        let path = path.parse().map_err(EthAppError::InvalidBip32Path)?;
        let raw_tx = raw_tx.trim();
        let transaction_data = hex::decode(raw_tx.strip_prefix("0x").unwrap_or(raw_tx))
            .map_err(|e| EthAppError::InvalidTransaction(e.to_string()))?;

        EthApp::sign_transaction(
            &self.transport,
            SignTransactionParams::new(path, transaction_data),
        )
        .await
    }

    /// Re-sign a signed transaction copied from a block explorer
    ///
    /// The signature fields are neutralised by the configured
    /// [`EtherscanAdapter`] before anything is sent to the device.
    pub async fn sign_etherscan_transaction(
        &self,
        path: &str,
        signed_tx: &str,
    ) -> EthAppResult<TransactionSignature, E::Error> {
        let path = path.parse().map_err(EthAppError::InvalidBip32Path)?;
        let transaction_data = self.adapter.unsigned_payload(signed_tx)?;

        EthApp::sign_transaction(
            &self.transport,
            SignTransactionParams::new(path, transaction_data),
        )
        .await
    }
}
