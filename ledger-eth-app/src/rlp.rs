// SPDX-License-Identifier: Apache-2.0

//! Schema-less RLP items
//!
//! Transactions coming from block explorers are handled field by field
//! without knowing their concrete type, so items are kept as raw byte
//! strings and nested lists.

use alloy_rlp::{BufMut, Decodable, Encodable, Header};

/// Transaction type bytes accepted as an EIP-2718 envelope marker
pub const TYPED_TRANSACTION_MARKERS: [u8; 2] = [0x01, 0x02];

/// A decoded RLP item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Decode exactly one item; bytes left after it are an error
    pub fn decode_exact(mut data: &[u8]) -> alloy_rlp::Result<Self> {
        let item = Self::decode(&mut data)?;
        if !data.is_empty() {
            return Err(alloy_rlp::Error::Custom("trailing bytes after RLP item"));
        }
        Ok(item)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        out
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::Bytes(_) => None,
        }
    }

    fn payload_length(items: &[RlpItem]) -> usize {
        items.iter().map(Encodable::length).sum()
    }
}

impl Encodable for RlpItem {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().encode(out),
            RlpItem::List(items) => {
                Header {
                    list: true,
                    payload_length: Self::payload_length(items),
                }
                .encode(out);
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().length(),
            RlpItem::List(items) => {
                let payload_length = Self::payload_length(items);
                payload_length + alloy_rlp::length_of_length(payload_length)
            }
        }
    }
}

impl Decodable for RlpItem {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        let data: &[u8] = *buf;
        if data.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let (mut payload, rest) = data.split_at(header.payload_length);
        *buf = rest;

        if !header.list {
            return Ok(RlpItem::Bytes(payload.to_vec()));
        }

        let mut items = Vec::new();
        while !payload.is_empty() {
            items.push(RlpItem::decode(&mut payload)?);
        }
        Ok(RlpItem::List(items))
    }
}

/// Split an optional type byte from the RLP body of a serialized transaction
pub fn split_envelope(raw: &[u8]) -> (Option<u8>, &[u8]) {
    match raw.split_first() {
        Some((&marker, body)) if TYPED_TRANSACTION_MARKERS.contains(&marker) => {
            (Some(marker), body)
        }
        _ => (None, raw),
    }
}

/// Minimal big-endian encoding of an integer, empty for zero
pub fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_and_short_strings() {
        assert_eq!(
            RlpItem::decode_exact(&[0x01]).unwrap(),
            RlpItem::Bytes(vec![0x01])
        );
        assert_eq!(RlpItem::decode_exact(&[0x80]).unwrap(), RlpItem::Bytes(vec![]));
        assert_eq!(
            RlpItem::decode_exact(&[0x82, 0x52, 0x08]).unwrap(),
            RlpItem::Bytes(vec![0x52, 0x08])
        );
    }

    #[test]
    fn nested_list_reencodes_identically() {
        // [ [], [[]], 0x0400 ]
        let encoded = hex::decode("c6c0c1c0820400").unwrap();
        let item = RlpItem::decode_exact(&encoded).unwrap();
        assert_eq!(
            item,
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
                RlpItem::Bytes(vec![0x04, 0x00]),
            ])
        );
        assert_eq!(item.to_vec(), encoded);
        assert_eq!(item.length(), encoded.len());
    }

    #[test]
    fn long_list_header() {
        let item = RlpItem::List(vec![RlpItem::Bytes(vec![0xaa; 60])]);
        let encoded = item.to_vec();
        // 62-byte payload needs a one-byte length of length
        assert_eq!(&encoded[..3], &[0xf8, 62, 0xb8]);
        assert_eq!(RlpItem::decode_exact(&encoded).unwrap(), item);
    }

    #[test]
    fn truncated_and_trailing_input() {
        assert_eq!(
            RlpItem::decode_exact(&[0xc3, 0x01, 0x02]),
            Err(alloy_rlp::Error::InputTooShort)
        );
        assert!(RlpItem::decode_exact(&[0x01, 0x02]).is_err());
        assert!(RlpItem::decode_exact(&[]).is_err());
    }

    #[test]
    fn envelope_marker() {
        assert_eq!(split_envelope(&[0x02, 0xc0]), (Some(0x02), &[0xc0][..]));
        assert_eq!(split_envelope(&[0x01, 0xc0]), (Some(0x01), &[0xc0][..]));
        assert_eq!(split_envelope(&[0xeb, 0x44]), (None, &[0xeb, 0x44][..]));
        assert_eq!(split_envelope(&[]), (None, &[][..]));
    }

    #[test]
    fn minimal_integers() {
        assert_eq!(minimal_be_bytes(0), Vec::<u8>::new());
        assert_eq!(minimal_be_bytes(1), vec![0x01]);
        assert_eq!(minimal_be_bytes(0x1a21a278be), vec![0x1a, 0x21, 0xa2, 0x78, 0xbe]);
    }
}
