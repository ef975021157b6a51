// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerTcpError {
    /// Emulator did not accept connections in time
    #[error("Speculos not reachable on {addr} after {elapsed:?}")]
    ConnectTimeout {
        addr: SocketAddr,
        elapsed: Duration,
    },
    /// Communication error
    #[error("Speculos: communication error `{0}`")]
    Comm(&'static str),
    /// i/o error
    #[error("Speculos: i/o error")]
    Io(#[from] std::io::Error),
}
