// SPDX-License-Identifier: Apache-2.0

//! SIGN ETH PERSONAL MESSAGE command implementation

use async_trait::async_trait;
use ledger_device_base::{App, AppExt};
use ledger_transport::{APDUCommand, Exchange};

use crate::errors::{EthAppError, EthAppResult};
use crate::instructions::{ins, length, p1_chunk};
use crate::types::{SignMessageParams, Signature};
use crate::utils::{chunk_with_path, validate_bip32_path};
use crate::EthApp;

#[async_trait]
pub trait SignPersonalMessage<E>
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    /// Sign an Ethereum personal message using the given BIP 32 path
    async fn sign_personal_message(
        transport: &E,
        params: SignMessageParams,
    ) -> EthAppResult<Signature, E::Error>;
}

#[async_trait]
impl<E> SignPersonalMessage<E> for EthApp
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    async fn sign_personal_message(
        transport: &E,
        params: SignMessageParams,
    ) -> EthAppResult<Signature, E::Error> {
        validate_bip32_path(&params.path)?;

        if params.message.is_empty() {
            return Err(EthAppError::InvalidMessage(
                "Message cannot be empty".to_string(),
            ));
        }

        let message_len = u32::try_from(params.message.len())
            .map_err(|_| EthAppError::InvalidMessage("Message too long".to_string()))?;

        // path || message length (u32 BE) || message, split like transactions
        let mut data = Vec::with_capacity(length::MESSAGE_LENGTH_SIZE + params.message.len());
        data.extend_from_slice(&message_len.to_be_bytes());
        data.extend_from_slice(&params.message);

        let chunks = chunk_with_path(&params.path, &data, None);
        let last = chunks.len() - 1;
        let mut signature = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let command = APDUCommand {
                cla: Self::CLA,
                ins: ins::SIGN_ETH_PERSONAL_MESSAGE,
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

            if i < last {
                <EthApp as AppExt<E>>::handle_response_error(&response)
                    .map_err(EthAppError::Transport)?;
                continue;
            }

            <EthApp as AppExt<E>>::handle_response_error_signature(&response)
                .map_err(EthAppError::Transport)?;
            signature =
                Some(Signature::from_vrs(response.data()).map_err(EthAppError::InvalidSignature)?);
        }

        signature.ok_or_else(|| {
            EthAppError::InvalidResponseData("Expected signature but got none".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BipPath;
    use ledger_transport::mock::ScriptedTransport;

    fn vrs(v: u8) -> Vec<u8> {
        let mut data = vec![v];
        data.extend([0x11; 32]);
        data.extend([0x22; 32]);
        data
    }

    #[tokio::test]
    async fn short_message_in_one_chunk() {
        let transport = ScriptedTransport::new();
        transport.push_answer(&vrs(28), 0x9000);

        let path: BipPath = "44'/60'/0'/0/0".parse().unwrap();
        let params = SignMessageParams::new(path, b"Example `personal_sign` message".to_vec());
        let signature = EthApp::sign_personal_message(&transport, params).await.unwrap();
        assert_eq!(signature.v, 28);
        assert_eq!(signature.r, vec![0x11; 32]);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..5], &[0xe0, 0x08, 0x00, 0x00, 21 + 4 + 31]);
        assert_eq!(&sent[0][26..30], &31u32.to_be_bytes());
    }

    #[tokio::test]
    async fn long_message_is_chunked() {
        let transport = ScriptedTransport::new();
        transport.push_ok().push_answer(&vrs(27), 0x9000);

        let path: BipPath = "44'/60'/0'/0/0".parse().unwrap();
        let params = SignMessageParams::new(path, vec![b'a'; 200]);
        EthApp::sign_personal_message(&transport, params).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0][4], 150);
        // 125 message bytes fit next to path and length
        assert_eq!(&sent[1][..5], &[0xe0, 0x08, 0x80, 0x00, 75]);
    }

    #[tokio::test]
    async fn user_rejection() {
        let transport = ScriptedTransport::new();
        transport.push_answer(&[], 0x6985);

        let path = BipPath::ethereum_standard(0, 0);
        let err = EthApp::sign_personal_message(&transport, SignMessageParams::new(path, vec![1]))
            .await
            .unwrap_err();
        assert!(err.is_user_rejected());
        assert_eq!(err.status_word(), Some(0x6985));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_locally() {
        let transport = ScriptedTransport::new();
        let path = BipPath::ethereum_standard(0, 0);
        let err = EthApp::sign_personal_message(&transport, SignMessageParams::new(path, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, EthAppError::InvalidMessage(_)));
        assert!(transport.sent().is_empty());
    }
}
