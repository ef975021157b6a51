// SPDX-License-Identifier: Apache-2.0

//! APDU transport over the Speculos TCP socket
//!
//! Speculos exposes the emulated device on a raw TCP port. A command is sent
//! as a 4-byte big-endian length followed by the APDU; the answer comes back
//! as a 4-byte big-endian length of the payload, the payload itself, and the
//! 2-byte status word.

mod errors;

use std::{net::SocketAddr, ops::Deref, time::Duration};

use byteorder::{BigEndian, ByteOrder};
pub use errors::LedgerTcpError;
use ledger_transport::{async_trait, APDUAnswer, APDUCommand, Exchange, APDU_MAX_DATA_SIZE};
use log::{debug, info};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
    time::Instant,
};

pub const SPECULOS_DEFAULT_APDU_PORT: u16 = 9999;
pub const SPECULOS_LENGTH_PREFIX_SIZE: usize = 4;
pub const SPECULOS_STATUS_WORD_SIZE: usize = 2;
pub const SPECULOS_CONNECT_RETRY: Duration = Duration::from_millis(100);

pub struct TransportSpeculosTcp {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
}

impl TransportSpeculosTcp {
    /// Open a connection to an emulator that is already listening
    pub async fn connect(addr: SocketAddr) -> Result<Self, LedgerTcpError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        info!("connected to speculos on {}", addr);

        Ok(TransportSpeculosTcp {
            stream: Mutex::new(stream),
            addr,
        })
    }

    /// Keep trying to connect until the emulator accepts or `timeout` elapses
    pub async fn connect_with_retry(
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<Self, LedgerTcpError> {
        let started = Instant::now();

        loop {
            match Self::connect(addr).await {
                Ok(transport) => return Ok(transport),
                Err(LedgerTcpError::Io(err)) if started.elapsed() < timeout => {
                    debug!("speculos on {} not ready yet: {}", addr, err);
                    tokio::time::sleep(SPECULOS_CONNECT_RETRY).await;
                }
                Err(LedgerTcpError::Io(_)) => {
                    return Err(LedgerTcpError::ConnectTimeout {
                        addr,
                        elapsed: started.elapsed(),
                    })
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn write_apdu(stream: &mut TcpStream, apdu_command: &[u8]) -> Result<(), LedgerTcpError> {
        let command_length = u32::try_from(apdu_command.len())
            .map_err(|_| LedgerTcpError::Comm("APDU too long for the length prefix"))?;

        let mut buffer = vec![0u8; SPECULOS_LENGTH_PREFIX_SIZE];
        BigEndian::write_u32(&mut buffer, command_length);
        buffer.extend_from_slice(apdu_command);

        info!("[{:3}] << {:}", apdu_command.len(), hex::encode(apdu_command));

        stream.write_all(&buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn read_apdu(
        stream: &mut TcpStream,
        apdu_answer: &mut Vec<u8>,
    ) -> Result<usize, LedgerTcpError> {
        let mut header = [0u8; SPECULOS_LENGTH_PREFIX_SIZE];
        stream.read_exact(&mut header).await?;

        let payload_len = BigEndian::read_u32(&header) as usize;

        // payload followed by the status word, which the length prefix does not count
        let expected_len = payload_len + SPECULOS_STATUS_WORD_SIZE;
        let start = apdu_answer.len();
        apdu_answer.resize(start + expected_len, 0);
        stream.read_exact(&mut apdu_answer[start..]).await?;

        info!(
            "[{:3}] >> {:}",
            expected_len,
            hex::encode(&apdu_answer[start..])
        );

        Ok(apdu_answer.len())
    }

    pub async fn exchange<I: Deref<Target = [u8]>>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Vec<u8>>, LedgerTcpError> {
        // Lc is a single byte
        if command.data.len() > APDU_MAX_DATA_SIZE {
            return Err(LedgerTcpError::Comm("APDU payload longer than 255 bytes"));
        }

        // held for the whole round trip so concurrent callers cannot interleave frames
        let mut stream = self.stream.lock().await;

        Self::write_apdu(&mut stream, &command.serialize()).await?;

        let mut answer = Vec::with_capacity(256);
        Self::read_apdu(&mut stream, &mut answer).await?;

        APDUAnswer::from_answer(answer)
            .map_err(|_| LedgerTcpError::Comm("response was too short"))
    }
}

#[async_trait]
impl Exchange for TransportSpeculosTcp {
    type Error = LedgerTcpError;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        self.exchange(command).await
    }
}
