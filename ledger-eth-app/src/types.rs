// SPDX-License-Identifier: Apache-2.0

//! Core data types for Ethereum application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::instructions::length::{BIP32_INDEX_SIZE, MAX_BIP32_PATH_DEPTH, SIGNATURE_COMPONENT_SIZE};

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// BIP32 derivation path for Ethereum accounts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BipPath {
    /// Derivation indices (max 10 levels)
    pub indices: Vec<u32>,
}

impl BipPath {
    /// Create a new BIP32 path from derivation indices
    pub fn new(indices: Vec<u32>) -> Result<Self, String> {
        if indices.len() > MAX_BIP32_PATH_DEPTH {
            return Err(format!(
                "BIP32 path too deep: {} (max {})",
                indices.len(),
                MAX_BIP32_PATH_DEPTH
            ));
        }
        Ok(BipPath { indices })
    }

    /// Create a standard Ethereum derivation path: m/44'/60'/account'/0/address_index
    pub fn ethereum_standard(account: u32, address_index: u32) -> Self {
        BipPath {
            indices: vec![
                HARDENED | 44,
                HARDENED | 60,
                HARDENED | account,
                0,
                address_index,
            ],
        }
    }

    /// Get the encoded length for APDU
    pub fn encoded_len(&self) -> usize {
        1 + self.indices.len() * BIP32_INDEX_SIZE
    }
}

impl FromStr for BipPath {
    type Err = String;

    /// Parse `44'/60'/0'/0/0`, with or without a leading `m/`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("m/").unwrap_or(s);
        if s.is_empty() {
            return Err("empty BIP32 path".to_string());
        }

        let indices = s
            .split('/')
            .map(|component| {
                let (number, hardened) = match component.strip_suffix('\'') {
                    Some(number) => (number, true),
                    None => (component, false),
                };
                let index: u32 = number
                    .parse()
                    .map_err(|_| format!("invalid path component `{component}`"))?;
                if index & HARDENED != 0 {
                    return Err(format!("path component `{component}` out of range"));
                }
                Ok(if hardened { index | HARDENED } else { index })
            })
            .collect::<Result<Vec<_>, String>>()?;

        BipPath::new(indices)
    }
}

impl fmt::Display for BipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.indices {
            if *index >= HARDENED {
                write!(f, "/{}'", index - HARDENED)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// Ethereum address information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthAddress {
    /// ASCII-encoded Ethereum address (with 0x prefix)
    pub address: String,
}

impl EthAddress {
    /// Create a new Ethereum address from hex string
    pub fn new(address: String) -> Result<Self, String> {
        if !address.starts_with("0x") {
            return Err("Ethereum address must start with 0x".to_string());
        }
        if address.len() != 42 {
            return Err("Ethereum address must be 42 characters long".to_string());
        }
        Ok(EthAddress { address })
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Public key information returned from device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// Uncompressed public key (65 bytes)
    pub public_key: Vec<u8>,
    /// Ethereum address derived from public key
    pub address: EthAddress,
    /// Optional chain code (32 bytes) if requested
    pub chain_code: Option<Vec<u8>>,
}

/// Signature over a personal message, `v` as returned by the device (27 or 28)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u8,
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl Signature {
    /// Split a `v || r || s` answer
    pub fn from_vrs(data: &[u8]) -> Result<Self, String> {
        let expected = 1 + 2 * SIGNATURE_COMPONENT_SIZE;
        if data.len() != expected {
            return Err(format!(
                "Invalid signature response length: {} bytes (expected {})",
                data.len(),
                expected
            ));
        }

        Ok(Signature {
            v: data[0],
            r: data[1..1 + SIGNATURE_COMPONENT_SIZE].to_vec(),
            s: data[1 + SIGNATURE_COMPONENT_SIZE..].to_vec(),
        })
    }
}

/// Transaction signature as hex strings without `0x`
///
/// `v` has an even number of digits and may be wider than a byte for large
/// chain ids, e.g. `344344f19f` for chain id `0x1a21a278be`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub v: String,
    pub r: String,
    pub s: String,
}

/// Application configuration information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfiguration {
    /// Configuration flags
    pub flags: ConfigFlags,
    /// Application version
    pub version: AppVersion,
}

/// Configuration flags for the Ethereum application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFlags {
    /// Blind signing of contract data enabled by the user
    pub arbitrary_data_signature: bool,
    /// ERC 20 Token information needs to be provided externally
    pub erc20_external_info: bool,
}

impl ConfigFlags {
    pub fn from_byte(flags: u8) -> Self {
        use crate::instructions::config_flags::*;

        ConfigFlags {
            arbitrary_data_signature: flags & ARBITRARY_DATA_SIGNATURE != 0,
            erc20_external_info: flags & ERC20_EXTERNAL_INFO != 0,
        }
    }
}

/// Application version information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parameters for GET ETH PUBLIC ADDRESS command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetAddressParams {
    /// BIP32 derivation path
    pub path: BipPath,
    /// Whether to display address on device and require confirmation
    pub display: bool,
    /// Whether to return chain code
    pub return_chain_code: bool,
    /// Optional chain ID for validation
    pub chain_id: Option<u64>,
}

impl GetAddressParams {
    pub fn new(path: BipPath) -> Self {
        GetAddressParams {
            path,
            display: false,
            return_chain_code: false,
            chain_id: None,
        }
    }

    /// Enable display and confirmation on device
    pub fn with_display(mut self) -> Self {
        self.display = true;
        self
    }

    pub fn with_chain_code(mut self) -> Self {
        self.return_chain_code = true;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}

/// Parameters for SIGN ETH TRANSACTION command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignTransactionParams {
    /// BIP32 derivation path
    pub path: BipPath,
    /// Unsigned serialized transaction: optional type byte then the RLP list
    pub transaction_data: Vec<u8>,
}

impl SignTransactionParams {
    pub fn new(path: BipPath, transaction_data: Vec<u8>) -> Self {
        SignTransactionParams {
            path,
            transaction_data,
        }
    }
}

/// Parameters for SIGN ETH PERSONAL MESSAGE command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignMessageParams {
    /// BIP32 derivation path
    pub path: BipPath,
    /// Message data to sign
    pub message: Vec<u8>,
}

impl SignMessageParams {
    pub fn new(path: BipPath, message: Vec<u8>) -> Self {
        SignMessageParams { path, message }
    }
}
