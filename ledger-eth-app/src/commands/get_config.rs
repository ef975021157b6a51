// SPDX-License-Identifier: Apache-2.0

//! GET APP CONFIGURATION command implementation

use async_trait::async_trait;
use ledger_device_base::{App, AppExt};
use ledger_transport::{APDUCommand, Exchange};

use crate::errors::{EthAppError, EthAppResult};
use crate::instructions::ins;
use crate::types::{AppConfiguration, AppVersion, ConfigFlags};
use crate::EthApp;

#[async_trait]
pub trait GetConfiguration<E>
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    /// Get Ethereum application configuration
    async fn get_configuration(transport: &E) -> EthAppResult<AppConfiguration, E::Error>;
}

#[async_trait]
impl<E> GetConfiguration<E> for EthApp
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    async fn get_configuration(transport: &E) -> EthAppResult<AppConfiguration, E::Error> {
        let command = APDUCommand {
            cla: Self::CLA,
            ins: ins::GET_APP_CONFIGURATION,
            p1: 0x00,
            p2: 0x00,
            data: Vec::new(),
        };

        let response = transport
            .exchange(&command)
            .await
            .map_err(|e| EthAppError::Transport(e.into()))?;

        <EthApp as AppExt<E>>::handle_response_error(&response).map_err(EthAppError::Transport)?;

        parse_get_configuration_response::<E::Error>(response.data())
    }
}

/// flags(1) || major(1) || minor(1) || patch(1)
fn parse_get_configuration_response<E: std::error::Error>(
    data: &[u8],
) -> EthAppResult<AppConfiguration, E> {
    match *data {
        [flags, major, minor, patch, ..] => Ok(AppConfiguration {
            flags: ConfigFlags::from_byte(flags),
            version: AppVersion {
                major,
                minor,
                patch,
            },
        }),
        _ => Err(EthAppError::InvalidResponseData(format!(
            "Configuration response too short: {} bytes (expected 4)",
            data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::config_flags;
    use ledger_transport::mock::ScriptedTransport;

    #[tokio::test]
    async fn blind_signing_flag_and_version() {
        let transport = ScriptedTransport::new();
        transport.push_answer(&[config_flags::ARBITRARY_DATA_SIGNATURE, 1, 9, 17], 0x9000);

        let config = EthApp::get_configuration(&transport).await.unwrap();
        assert!(config.flags.arbitrary_data_signature);
        assert!(!config.flags.erc20_external_info);
        assert_eq!(config.version.to_string(), "1.9.17");

        assert_eq!(transport.sent(), vec![vec![0xe0, 0x06, 0x00, 0x00, 0x00]]);
    }

    #[test]
    fn test_parse_get_configuration_response_too_short() {
        let response_data = vec![0x01, 1, 2]; // Missing patch version

        let result = parse_get_configuration_response::<std::io::Error>(&response_data);
        assert!(matches!(
            result.unwrap_err(),
            EthAppError::InvalidResponseData(_)
        ));
    }
}
