// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by Ledger application clients
//!
//! [`AppExt`] normalises status words into [`LedgerAppError`] so callers can
//! match a rejection by its exact value, and queries the running
//! application's name and version.

mod errors;
use std::str;

use async_trait::async_trait;
pub use errors::*;
use ledger_transport::{APDUAnswer, APDUCommand, APDUErrorCode, Exchange};
use log::debug;
use serde::{Deserialize, Serialize};

// Ledger generic (non app-specific) APDU constants
const CLA_APP_INFO: u8 = 0xb0;
const INS_APP_INFO: u8 = 0x01;
const APP_INFO_FORMAT_ID: u8 = 0x01;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
/// App Information
pub struct AppInfo {
    /// Name of the application
    #[serde(rename(serialize = "appName"))]
    pub app_name: String,
    /// App version
    #[serde(rename(serialize = "appVersion"))]
    pub app_version: String,
    /// Flag length
    #[serde(rename(serialize = "flagLen"))]
    pub flag_len: u8,
    /// Flag value
    #[serde(rename(serialize = "flagsValue"))]
    pub flags_value: u8,
    /// Flag Recovery
    #[serde(rename(serialize = "flagsRecovery"))]
    pub flag_recovery: bool,
    /// Flag Signed MCU code
    #[serde(rename(serialize = "flagsSignedMCUCode"))]
    pub flag_signed_mcu_code: bool,
    /// Flag Onboarded
    #[serde(rename(serialize = "flagsOnboarded"))]
    pub flag_onboarded: bool,
    /// Flag Pin Validated
    #[serde(rename(serialize = "flagsPINValidated"))]
    pub flag_pin_validated: bool,
}

/// Defines what we can consider an "App"
pub trait App {
    /// App's APDU CLA
    const CLA: u8;
}

/// Map a status word to `Ok(())` on `0x9000` and to a [`LedgerAppError`] otherwise
pub fn check_status_word<E: std::error::Error, B: std::ops::Deref<Target = [u8]>>(
    response: &APDUAnswer<B>,
) -> Result<(), LedgerAppError<E>> {
    match response.error_code() {
        Ok(APDUErrorCode::NoError) => Ok(()),
        Ok(err) => Err(LedgerAppError::AppSpecific(err as _, err.description())),
        Err(err) => Err(LedgerAppError::Unknown(err)),
    }
}

#[async_trait]
pub trait AppExt<E>: App
where
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
    /// Ok on 0x9000, otherwise the status word as `AppSpecific` or `Unknown`
    fn handle_response_error(
        response: &APDUAnswer<E::AnswerType>,
    ) -> Result<(), LedgerAppError<E::Error>> {
        check_status_word(response)
    }

    /// Same as `handle_response_error`, but also requires non-empty payload (signature).
    fn handle_response_error_signature(
        response: &APDUAnswer<E::AnswerType>,
    ) -> Result<(), LedgerAppError<E::Error>> {
        check_status_word(response)?;
        if response.data().is_empty() {
            return Err(LedgerAppError::NoSignature);
        }
        Ok(())
    }

    /// Query the name, version and flags of the running application
    async fn get_app_info(transport: &E) -> Result<AppInfo, LedgerAppError<E::Error>> {
        let command = APDUCommand {
            cla: CLA_APP_INFO,
            ins: INS_APP_INFO,
            p1: 0x00,
            p2: 0x00,
            data: Vec::new(),
        };

        let response = transport.exchange(&command).await?;
        Self::handle_response_error(&response)?;

        let app_info = parse_app_info(response.data())?;
        debug!("running app: {} {}", app_info.app_name, app_info.app_version);

        Ok(app_info)
    }
}

impl<T, E> AppExt<E> for T
where
    T: App,
    E: Exchange + Send + Sync,
    E::Error: std::error::Error,
{
}

/// Reads one length-prefixed field starting at `*idx`
fn read_field<'a, E: std::error::Error>(
    data: &'a [u8],
    idx: &mut usize,
    name: &str,
) -> Result<&'a [u8], LedgerAppError<E>> {
    let len = *data
        .get(*idx)
        .ok_or_else(|| LedgerAppError::InvalidResponse(format!("missing {name} length")))?
        as usize;
    let start = *idx + 1;
    let field = data
        .get(start..start + len)
        .ok_or_else(|| LedgerAppError::InvalidResponse(format!("truncated {name}")))?;
    *idx = start + len;
    Ok(field)
}

fn parse_app_info<E: std::error::Error>(data: &[u8]) -> Result<AppInfo, LedgerAppError<E>> {
    match data.first() {
        Some(&APP_INFO_FORMAT_ID) => {}
        Some(_) => return Err(LedgerAppError::InvalidFormatID),
        None => return Err(LedgerAppError::InvalidResponse("empty app info".to_string())),
    }

    let mut idx = 1;
    let app_name_bytes = read_field(data, &mut idx, "app name")?;
    let app_version_bytes = read_field(data, &mut idx, "app version")?;
    let flags = read_field(data, &mut idx, "flags")?;

    let flags_value = flags.first().copied().unwrap_or_default();

    let app_name = str::from_utf8(app_name_bytes).map_err(|_e| LedgerAppError::Utf8)?;
    let app_version = str::from_utf8(app_version_bytes).map_err(|_e| LedgerAppError::Utf8)?;

    Ok(AppInfo {
        app_name: app_name.to_string(),
        app_version: app_version.to_string(),
        flag_len: flags.len() as u8,
        flags_value,
        flag_recovery: (flags_value & 1) != 0,
        flag_signed_mcu_code: (flags_value & 2) != 0,
        flag_onboarded: (flags_value & 4) != 0,
        flag_pin_validated: (flags_value & 128) != 0,
    })
}
