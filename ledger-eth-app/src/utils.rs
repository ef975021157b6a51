// SPDX-License-Identifier: Apache-2.0

//! Utility functions for Ethereum application

use crate::errors::{EthAppError, EthAppResult};
use crate::instructions::length;
use crate::types::{BipPath, EthAddress};

/// Encode BIP32 path for APDU command
pub fn encode_bip32_path(path: &BipPath) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(path.encoded_len());

    // Add path length
    encoded.push(path.indices.len() as u8);

    // Add each index in big-endian format
    for &index in &path.indices {
        encoded.extend_from_slice(&index.to_be_bytes());
    }

    encoded
}

/// Decode a BIP32 path from the head of a command payload
///
/// Returns the path and the number of bytes it occupied.
pub fn decode_bip32_path<E: std::error::Error>(data: &[u8]) -> EthAppResult<(BipPath, usize), E> {
    let path_len = *data
        .first()
        .ok_or_else(|| EthAppError::InvalidBip32Path("Empty path data".to_string()))?
        as usize;

    let expected_size = 1 + path_len * length::BIP32_INDEX_SIZE;
    if data.len() < expected_size {
        return Err(EthAppError::InvalidBip32Path(format!(
            "Insufficient data: {} bytes (expected {})",
            data.len(),
            expected_size
        )));
    }

    let indices = data[1..expected_size]
        .chunks_exact(length::BIP32_INDEX_SIZE)
        .map(|index| u32::from_be_bytes([index[0], index[1], index[2], index[3]]))
        .collect();

    let path = BipPath::new(indices).map_err(EthAppError::InvalidBip32Path)?;

    Ok((path, expected_size))
}

/// Validate BIP32 path for Ethereum usage
pub fn validate_bip32_path<E: std::error::Error>(path: &BipPath) -> EthAppResult<(), E> {
    if path.indices.is_empty() {
        return Err(EthAppError::InvalidBip32Path("Empty path".to_string()));
    }

    if path.indices.len() > length::MAX_BIP32_PATH_DEPTH {
        return Err(EthAppError::InvalidBip32Path(format!(
            "Path too deep: {} (max {})",
            path.indices.len(),
            length::MAX_BIP32_PATH_DEPTH
        )));
    }

    Ok(())
}

/// Split `path || data` into signing command chunks
///
/// The first chunk holds the encoded path followed by as much data as fits
/// in [`length::MAX_CHUNK_SIZE`]. Once a chunk would reach `tail_offset`
/// (an offset into `data`), everything left goes into that chunk.
pub fn chunk_with_path(path: &BipPath, data: &[u8], tail_offset: Option<usize>) -> Vec<Vec<u8>> {
    let path_data = encode_bip32_path(path);
    let mut chunks = Vec::new();
    let mut offset = 0;

    loop {
        let first = offset == 0;
        let max_chunk_size = if first {
            length::MAX_CHUNK_SIZE - path_data.len()
        } else {
            length::MAX_CHUNK_SIZE
        };

        let mut chunk_size = max_chunk_size.min(data.len() - offset);
        if let Some(tail) = tail_offset {
            if offset + chunk_size >= tail {
                chunk_size = data.len() - offset;
            }
        }

        let mut chunk = Vec::with_capacity(chunk_size + if first { path_data.len() } else { 0 });
        if first {
            chunk.extend_from_slice(&path_data);
        }
        chunk.extend_from_slice(&data[offset..offset + chunk_size]);
        chunks.push(chunk);

        offset += chunk_size;
        if offset >= data.len() {
            return chunks;
        }
    }
}

/// Validate Ethereum address format
pub fn validate_ethereum_address<E: std::error::Error>(address: &str) -> EthAppResult<(), E> {
    if !address.starts_with("0x") {
        return Err(EthAppError::InvalidAddress(
            "Address must start with 0x".to_string(),
        ));
    }

    if address.len() != 42 {
        return Err(EthAppError::InvalidAddress(format!(
            "Address must be 42 characters long, got {}",
            address.len()
        )));
    }

    if let Some((i, c)) = address[2..]
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_hexdigit())
    {
        return Err(EthAppError::InvalidAddress(format!(
            "Invalid character '{}' at position {}",
            c,
            i + 2
        )));
    }

    Ok(())
}

/// Parse ASCII-encoded address from device response
pub fn parse_device_address<E: std::error::Error>(
    data: &[u8],
    offset: usize,
) -> EthAppResult<(EthAddress, usize), E> {
    let address_len = *data.get(offset).ok_or_else(|| {
        EthAppError::InvalidResponseData("Insufficient data for address length".to_string())
    })? as usize;
    let address_start = offset + 1;
    let address_end = address_start + address_len;

    let address_bytes = data.get(address_start..address_end).ok_or_else(|| {
        EthAppError::InvalidResponseData(format!(
            "Insufficient data for address: available {}, needed {}",
            data.len() - address_start,
            address_len
        ))
    })?;

    let mut address_str = std::str::from_utf8(address_bytes)
        .map_err(|_| EthAppError::InvalidResponseData("Invalid UTF-8 in address".to_string()))?
        .to_string();

    // the app answers the 40 hex digits without prefix
    if address_str.len() == 40 && !address_str.starts_with("0x") {
        address_str = format!("0x{}", address_str);
    }

    validate_ethereum_address(&address_str)?;
    let address = EthAddress::new(address_str).map_err(EthAppError::InvalidAddress)?;

    Ok((address, address_end))
}

/// Parse public key from device response
pub fn parse_device_public_key<E: std::error::Error>(
    data: &[u8],
    offset: usize,
) -> EthAppResult<(Vec<u8>, usize), E> {
    let key_len = *data.get(offset).ok_or_else(|| {
        EthAppError::InvalidResponseData("Insufficient data for public key length".to_string())
    })? as usize;

    if key_len != length::PUBLIC_KEY_SIZE {
        return Err(EthAppError::InvalidResponseData(format!(
            "Invalid public key length: {} (expected {})",
            key_len,
            length::PUBLIC_KEY_SIZE
        )));
    }

    let key_start = offset + 1;
    let key_end = key_start + key_len;
    let public_key = data.get(key_start..key_end).ok_or_else(|| {
        EthAppError::InvalidResponseData(format!(
            "Insufficient data for public key: available {}, needed {}",
            data.len() - key_start,
            key_len
        ))
    })?;

    Ok((public_key.to_vec(), key_end))
}

/// Parse optional chain code from device response
pub fn parse_device_chain_code<E: std::error::Error>(
    data: &[u8],
    offset: usize,
) -> EthAppResult<(Option<Vec<u8>>, usize), E> {
    if offset >= data.len() {
        return Ok((None, offset));
    }

    let end = offset + length::CHAIN_CODE_SIZE;
    let chain_code = data.get(offset..end).ok_or_else(|| {
        EthAppError::InvalidResponseData(format!(
            "Insufficient data for chain code: available {}, needed {}",
            data.len() - offset,
            length::CHAIN_CODE_SIZE
        ))
    })?;

    Ok((Some(chain_code.to_vec()), end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bip32_path() {
        let path = BipPath::new(vec![0x8000002C, 0x8000003C, 0x80000000, 0, 0]).unwrap();
        let encoded = encode_bip32_path(&path);

        assert_eq!(encoded[0], 5); // path length
        assert_eq!(&encoded[1..5], &0x8000002Cu32.to_be_bytes());
        assert_eq!(&encoded[5..9], &0x8000003Cu32.to_be_bytes());

        let (decoded, used) = decode_bip32_path::<std::io::Error>(&encoded).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(used, 21);
    }

    #[test]
    fn test_decode_bip32_path_truncated() {
        let result = decode_bip32_path::<std::io::Error>(&[0x05, 0x80, 0x00, 0x00]);
        assert!(matches!(result, Err(EthAppError::InvalidBip32Path(_))));
    }

    #[test]
    fn test_validate_ethereum_address() {
        assert!(validate_ethereum_address::<std::io::Error>(
            "0x742d35Cc6535C244B8c80A79d5d22efeAdBA5B90"
        )
        .is_ok());
        assert!(validate_ethereum_address::<std::io::Error>(
            "742d35Cc6535C244B8c80A79d5d22efeAdBA5B90"
        )
        .is_err());
        assert!(validate_ethereum_address::<std::io::Error>(
            "0x742d35Cc6535C244B8c80A79d5d22efeAdBA5B9X"
        )
        .is_err());
    }

    #[test]
    fn test_parse_device_address_with_40_char_address() {
        let mut response_data = vec![40];
        response_data.extend(b"742d35Cc6535C244B8c80A79d5d22efeAdBA5B90");

        let (address, offset) = parse_device_address::<std::io::Error>(&response_data, 0).unwrap();
        assert_eq!(
            address.address,
            "0x742d35Cc6535C244B8c80A79d5d22efeAdBA5B90"
        );
        assert_eq!(offset, 41);
    }

    #[test]
    fn test_chunks_fit_with_path() {
        let path = BipPath::ethereum_standard(1, 0);
        let data: Vec<u8> = (0..200u8).collect();

        let chunks = chunk_with_path(&path, &data, None);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 150);
        assert_eq!(&chunks[0][..21], &encode_bip32_path(&path)[..]);
        assert_eq!(chunks[0][21], 0);
        assert_eq!(chunks[1].len(), 200 - 129);
        assert_eq!(chunks[1][0], 129);
    }

    #[test]
    fn test_chunk_reaching_tail_takes_the_rest() {
        let path = BipPath::ethereum_standard(1, 0);
        let data = vec![0u8; 132];

        // 129 bytes fit in the first chunk, the tail starts at 129
        let chunks = chunk_with_path(&path, &data, Some(129));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 21 + 132);

        let chunks = chunk_with_path(&path, &data, Some(130));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 3);
    }

    #[test]
    fn test_empty_data_still_sends_the_path() {
        let path = BipPath::ethereum_standard(0, 0);
        let chunks = chunk_with_path(&path, &[], None);
        assert_eq!(chunks, vec![encode_bip32_path(&path)]);
    }
}
