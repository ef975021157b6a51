// SPDX-License-Identifier: Apache-2.0

use ledger_apdu::{APDUCommand, APDUDecodeError};
use proptest::collection::vec;
use proptest::prelude::*;

fn frame(header: [u8; 4], data: &[u8]) -> String {
    let mut bytes = header.to_vec();
    bytes.push(data.len() as u8);
    bytes.extend_from_slice(data);
    hex::encode(bytes)
}

proptest! {
    #[test]
    fn decoding_is_deterministic(header in any::<[u8; 4]>(), data in vec(any::<u8>(), 0..=255)) {
        let hex = frame(header, &data);

        let first = APDUCommand::from_hex(&hex).unwrap();
        prop_assert_eq!(&first, &APDUCommand::from_hex(&hex).unwrap());
        prop_assert_eq!(&first, &APDUCommand::from_hex(&hex.to_uppercase()).unwrap());

        prop_assert_eq!([first.cla, first.ins, first.p1, first.p2], header);
        prop_assert_eq!(&first.data, &data);
        prop_assert_eq!(first.to_hex(), hex.clone());
        prop_assert_eq!(APDUCommand::from_hex_checked(&hex).unwrap(), first);
    }

    #[test]
    fn length_byte_is_ignored(header in any::<[u8; 4]>(), lc in any::<u8>(), data in vec(any::<u8>(), 0..64)) {
        let mut bytes = header.to_vec();
        bytes.push(lc);
        bytes.extend_from_slice(&data);

        let command = APDUCommand::from_hex(&hex::encode(&bytes)).unwrap();
        prop_assert_eq!(&command.data, &data);
    }

    #[test]
    fn odd_length_is_rejected(header in any::<[u8; 5]>(), nibble in "[0-9a-f]") {
        let hex = format!("{}{}", hex::encode(header), nibble);
        prop_assert!(
            matches!(APDUCommand::from_hex(&hex), Err(APDUDecodeError::InvalidHex { .. })),
            "odd length hex must not decode"
        );
    }
}
