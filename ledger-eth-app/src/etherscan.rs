// SPDX-License-Identifier: Apache-2.0

//! Turning a signed transaction copied from a block explorer into the
//! unsigned payload the Ethereum app signs again
//!
//! Typed transactions (`0x01`, `0x02`) lose their trailing `[v, r, s]`.
//! Legacy transactions keep nine fields with `v` replaced by the chain id
//! and `r`, `s` emptied, which is the EIP-155 signing payload.

use log::debug;
use thiserror::Error;

use crate::rlp::{minimal_be_bytes, split_envelope, RlpItem};

/// Chain id written in place of `v` for legacy transactions unless configured
pub const DEFAULT_LEGACY_CHAIN_ID: u64 = 1;
/// `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`
pub const LEGACY_FIELD_COUNT: usize = 9;
/// Trailing `[v, r, s]`
pub const SIGNATURE_FIELD_COUNT: usize = 3;

/// Errors converting an explorer transaction
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RawTransactionError {
    /// Odd length or non-hex characters
    #[error("Invalid transaction hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The body is not valid RLP
    #[error("Invalid transaction RLP: {0}")]
    Rlp(#[from] alloy_rlp::Error),
    /// Valid RLP with the wrong shape for its transaction type
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
}

/// Converts signed explorer transactions into unsigned signing payloads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EtherscanAdapter {
    legacy_chain_id: u64,
}

impl Default for EtherscanAdapter {
    fn default() -> Self {
        EtherscanAdapter {
            legacy_chain_id: DEFAULT_LEGACY_CHAIN_ID,
        }
    }
}

impl EtherscanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain id stored in the `v` slot of legacy transactions
    pub fn with_legacy_chain_id(mut self, chain_id: u64) -> Self {
        self.legacy_chain_id = chain_id;
        self
    }

    pub fn legacy_chain_id(&self) -> u64 {
        self.legacy_chain_id
    }

    /// Unsigned payload as bytes: optional type byte followed by the RLP list
    pub fn unsigned_payload(&self, raw_tx: &str) -> Result<Vec<u8>, RawTransactionError> {
        let raw = decode_hex(raw_tx)?;
        let (tx_type, body) = split_envelope(&raw);

        let mut fields = match RlpItem::decode_exact(body)? {
            RlpItem::List(fields) => fields,
            RlpItem::Bytes(_) => {
                return Err(RawTransactionError::MalformedTransaction(
                    "transaction body is not an RLP list".to_string(),
                ))
            }
        };

        match tx_type {
            Some(marker) => {
                if fields.len() < SIGNATURE_FIELD_COUNT {
                    return Err(RawTransactionError::MalformedTransaction(format!(
                        "type {:#04x} transaction has {} fields, fewer than its signature",
                        marker,
                        fields.len()
                    )));
                }
                fields.truncate(fields.len() - SIGNATURE_FIELD_COUNT);
            }
            None => {
                if fields.len() != LEGACY_FIELD_COUNT {
                    return Err(RawTransactionError::MalformedTransaction(format!(
                        "legacy transaction has {} fields (expected {})",
                        fields.len(),
                        LEGACY_FIELD_COUNT
                    )));
                }
                let v = LEGACY_FIELD_COUNT - SIGNATURE_FIELD_COUNT;
                fields[v] = RlpItem::Bytes(minimal_be_bytes(self.legacy_chain_id));
                fields[v + 1] = RlpItem::Bytes(Vec::new());
                fields[v + 2] = RlpItem::Bytes(Vec::new());
            }
        }

        let mut payload = Vec::new();
        payload.extend(tx_type);
        payload.extend(RlpItem::List(fields).to_vec());

        debug!(
            "explorer transaction ({} bytes, type {:?}) -> unsigned payload ({} bytes)",
            raw.len(),
            tx_type,
            payload.len()
        );

        Ok(payload)
    }

    /// Same as [`EtherscanAdapter::unsigned_payload`], as lowercase hex without `0x`
    pub fn unsigned_payload_hex(&self, raw_tx: &str) -> Result<String, RawTransactionError> {
        self.unsigned_payload(raw_tx).map(hex::encode)
    }
}

fn decode_hex(raw_tx: &str) -> Result<Vec<u8>, RawTransactionError> {
    let raw_tx = raw_tx.trim();
    let raw_tx = raw_tx.strip_prefix("0x").unwrap_or(raw_tx);
    Ok(hex::decode(raw_tx)?)
}
