// SPDX-License-Identifier: Apache-2.0

//! Drive the Ethereum application inside the Speculos emulator
//!
//! A [`Session`] owns one emulator process for the duration of a scenario:
//!
//! - start the emulator and wait for the app to show its start text
//! - talk to the app over the APDU port ([`Session::transport`])
//! - wait for the review screen, click through it and compare snapshots
//! - close the emulator, whatever the scenario outcome
//!
//! Scenarios are usually written with [`with_session`].

pub mod api;
pub mod config;
mod errors;
pub mod navigation;
pub mod process;
pub mod session;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use api::{Button, ScreenEvent, SpeculosApi};
pub use config::{DeviceModel, SessionConfig, SnapshotConfig};
pub use errors::SessionError;
pub use ledger_transport::Exchange;
pub use ledger_transport_speculos::{LedgerTcpError, TransportSpeculosTcp};
pub use navigation::{ClickSchedule, ClickStep};
pub use session::{with_session, Session, SessionState};
