// SPDX-License-Identifier: Apache-2.0

//! APDU instruction constants for Ethereum application

/// APDU instruction codes for Ethereum application
pub mod ins {
    /// GET ETH PUBLIC ADDRESS
    pub const GET_ETH_PUBLIC_ADDRESS: u8 = 0x02;
    /// SIGN ETH TRANSACTION
    pub const SIGN_ETH_TRANSACTION: u8 = 0x04;
    /// GET APP CONFIGURATION
    pub const GET_APP_CONFIGURATION: u8 = 0x06;
    /// SIGN ETH PERSONAL MESSAGE
    pub const SIGN_ETH_PERSONAL_MESSAGE: u8 = 0x08;
    /// PROVIDE ERC 20 TOKEN INFORMATION
    pub const PROVIDE_ERC20_TOKEN_INFO: u8 = 0x0A;
    /// SET EXTERNAL PLUGIN
    pub const SET_EXTERNAL_PLUGIN: u8 = 0x12;
    /// PROVIDE NFT INFORMATION
    pub const PROVIDE_NFT_INFORMATION: u8 = 0x14;
    /// SET PLUGIN
    pub const SET_PLUGIN: u8 = 0x16;

    /// Name of an instruction code, for logs and replay tooling
    pub fn name(ins: u8) -> Option<&'static str> {
        let name = match ins {
            GET_ETH_PUBLIC_ADDRESS => "GET ETH PUBLIC ADDRESS",
            SIGN_ETH_TRANSACTION => "SIGN ETH TRANSACTION",
            GET_APP_CONFIGURATION => "GET APP CONFIGURATION",
            SIGN_ETH_PERSONAL_MESSAGE => "SIGN ETH PERSONAL MESSAGE",
            PROVIDE_ERC20_TOKEN_INFO => "PROVIDE ERC 20 TOKEN INFORMATION",
            SET_EXTERNAL_PLUGIN => "SET EXTERNAL PLUGIN",
            PROVIDE_NFT_INFORMATION => "PROVIDE NFT INFORMATION",
            SET_PLUGIN => "SET PLUGIN",
            _ => return None,
        };
        Some(name)
    }
}

/// P1 parameter constants for GET ETH PUBLIC ADDRESS
pub mod p1_get_address {
    /// Return address without confirmation
    pub const RETURN_ADDRESS: u8 = 0x00;
    /// Display address and confirm before returning
    pub const DISPLAY_AND_CONFIRM: u8 = 0x01;
}

/// P2 parameter constants for GET ETH PUBLIC ADDRESS
pub mod p2_get_address {
    pub const NO_CHAIN_CODE: u8 = 0x00;
    pub const RETURN_CHAIN_CODE: u8 = 0x01;
}

/// P1 for chunked commands (SIGN ETH TRANSACTION, SIGN ETH PERSONAL MESSAGE)
pub mod p1_chunk {
    /// First data block, carries the derivation path
    pub const FIRST_DATA_BLOCK: u8 = 0x00;
    /// Subsequent data block
    pub const SUBSEQUENT_DATA_BLOCK: u8 = 0x80;
}

/// Data length constants
pub mod length {
    /// Maximum BIP 32 derivation path depth
    pub const MAX_BIP32_PATH_DEPTH: usize = 10;
    /// Size of each BIP 32 derivation index
    pub const BIP32_INDEX_SIZE: usize = 4;
    /// Size of chain code
    pub const CHAIN_CODE_SIZE: usize = 32;
    /// Size of signature component (r or s)
    pub const SIGNATURE_COMPONENT_SIZE: usize = 32;
    /// Size of an uncompressed public key
    pub const PUBLIC_KEY_SIZE: usize = 65;
    /// Largest payload sent in one chunk of a signing command
    pub const MAX_CHUNK_SIZE: usize = 150;
    /// Size of the message length prefix of SIGN ETH PERSONAL MESSAGE
    pub const MESSAGE_LENGTH_SIZE: usize = 4;
}

/// App configuration flags
pub mod config_flags {
    /// Arbitrary data signature enabled by user
    pub const ARBITRARY_DATA_SIGNATURE: u8 = 0x01;
    /// ERC 20 Token information needs to be provided externally
    pub const ERC20_EXTERNAL_INFO: u8 = 0x02;
}
