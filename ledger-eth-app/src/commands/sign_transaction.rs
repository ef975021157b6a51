// SPDX-License-Identifier: Apache-2.0

//! SIGN ETH TRANSACTION command implementation
//!
//! The device only returns the low byte of `v`. For legacy transactions
//! with a chain id large enough that `v` no longer fits a byte, the full
//! value is rebuilt here from the chain id and the recovered parity.

use async_trait::async_trait;
use ledger_device_base::{App, AppExt};
use ledger_transport::{APDUCommand, Exchange};
use log::debug;
use num_bigint::BigUint;

use crate::errors::{EthAppError, EthAppResult};
use crate::instructions::{ins, p1_chunk};
use crate::rlp::{split_envelope, RlpItem};
use crate::types::{SignTransactionParams, Signature, TransactionSignature};
use crate::utils::{chunk_with_path, validate_bip32_path};
use crate::EthApp;

/// Index of the chain id in an unsigned EIP-155 legacy transaction
const LEGACY_CHAIN_ID_INDEX: usize = 6;
/// The device truncates the chain id to its most significant bytes
const DEVICE_CHAIN_ID_BYTES: usize = 4;

#[async_trait]
pub trait SignTransaction<E>
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    /// Sign an Ethereum transaction using the given BIP 32 path
    async fn sign_transaction(
        transport: &E,
        params: SignTransactionParams,
    ) -> EthAppResult<TransactionSignature, E::Error>;
}

#[async_trait]
impl<E> SignTransaction<E> for EthApp
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    async fn sign_transaction(
        transport: &E,
        params: SignTransactionParams,
    ) -> EthAppResult<TransactionSignature, E::Error> {
        validate_bip32_path(&params.path)?;

        if params.transaction_data.is_empty() {
            return Err(EthAppError::InvalidTransaction(
                "Transaction data cannot be empty".to_string(),
            ));
        }

        let info = TransactionInfo::decode(&params.transaction_data)?;
        let chunks = chunk_with_path(&params.path, &params.transaction_data, info.vrs_offset);
        debug!(
            "signing {} byte transaction (type {:?}) in {} chunk(s)",
            params.transaction_data.len(),
            info.tx_type,
            chunks.len()
        );

        let last = chunks.len() - 1;
        let mut signature = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let command = APDUCommand {
                cla: Self::CLA,
                ins: ins::SIGN_ETH_TRANSACTION,
                p1: if i == 0 {
                    p1_chunk::FIRST_DATA_BLOCK
                } else {
                    p1_chunk::SUBSEQUENT_DATA_BLOCK
                },
                p2: 0x00,
                data: chunk,
            };

            let response = transport
                .exchange(&command)
                .await
                .map_err(|e| EthAppError::Transport(e.into()))?;

            if i == last {
                <EthApp as AppExt<E>>::handle_response_error_signature(&response)
                    .map_err(EthAppError::Transport)?;
                signature = Some(
                    Signature::from_vrs(response.data()).map_err(EthAppError::InvalidResponseData)?,
                );
            } else {
                <EthApp as AppExt<E>>::handle_response_error(&response)
                    .map_err(EthAppError::Transport)?;
            }
        }

        let signature = signature.ok_or_else(|| {
            EthAppError::InvalidResponseData("Expected signature but got none".to_string())
        })?;

        Ok(TransactionSignature {
            v: info.recover_v(signature.v),
            r: hex::encode(signature.r),
            s: hex::encode(signature.s),
        })
    }
}

/// What the client needs to know about an unsigned transaction to send and sign it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// EIP-2718 type byte, `None` for legacy
    pub tx_type: Option<u8>,
    /// Chain id of a legacy EIP-155 transaction, minimal big-endian
    pub chain_id: Option<Vec<u8>>,
    /// Offset where the trailing three fields start, when the list has more than six
    pub vrs_offset: Option<usize>,
}

impl TransactionInfo {
    pub fn decode<E: std::error::Error>(raw: &[u8]) -> EthAppResult<Self, E> {
        let (tx_type, body) = split_envelope(raw);

        let fields = match RlpItem::decode_exact(body) {
            Ok(RlpItem::List(fields)) => fields,
            Ok(RlpItem::Bytes(_)) => {
                return Err(EthAppError::InvalidTransaction(
                    "transaction body is not an RLP list".to_string(),
                ))
            }
            Err(err) => return Err(EthAppError::InvalidTransaction(err.to_string())),
        };

        if fields.len() <= LEGACY_CHAIN_ID_INDEX {
            return Ok(TransactionInfo {
                tx_type,
                chain_id: None,
                vrs_offset: None,
            });
        }

        // offset of the first of the three trailing items within `raw`
        let trailer = RlpItem::List(fields[fields.len() - 3..].to_vec()).to_vec();
        let mut vrs_offset = raw.len() - (trailer.len() - 1);
        if trailer[0] > 0xf7 {
            vrs_offset += (trailer[0] - 0xf7) as usize;
        }

        let chain_id = match tx_type {
            None => fields[LEGACY_CHAIN_ID_INDEX]
                .as_bytes()
                .filter(|bytes| !bytes.is_empty())
                .map(<[u8]>::to_vec),
            Some(_) => None,
        };

        Ok(TransactionInfo {
            tx_type,
            chain_id,
            vrs_offset: Some(vrs_offset),
        })
    }

    /// Rebuild `v` from the byte answered by the device, as even-length hex
    pub fn recover_v(&self, device_v: u8) -> String {
        let v = match &self.chain_id {
            Some(chain_id) if self.tx_type.is_none() => {
                let chain_id = BigUint::from_bytes_be(chain_id);
                let eip155_base = chain_id * 2u32 + 35u32;

                if &eip155_base + 1u32 > BigUint::from(u8::MAX) {
                    // the byte the device computed from its truncated chain id, parity 0
                    let truncated = truncated_chain_id(self.chain_id.as_deref()) as u64;
                    let device_base = (truncated * 2 + 35) as u8;
                    let parity = device_v.wrapping_sub(device_base) & 1;
                    format!("{:x}", eip155_base + parity)
                } else {
                    format!("{:x}", device_v)
                }
            }
            _ => format!("{:x}", device_v),
        };

        if v.len() % 2 == 1 {
            format!("0{}", v)
        } else {
            v
        }
    }
}

fn truncated_chain_id(chain_id: Option<&[u8]>) -> u32 {
    chain_id
        .unwrap_or_default()
        .iter()
        .take(DEVICE_CHAIN_ID_BYTES)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}
