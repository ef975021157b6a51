// SPDX-License-Identifier: Apache-2.0

//! In-memory transport replaying canned device answers
//!
//! Every exchanged command is recorded so tests can assert on the exact
//! bytes that would have been written to the device.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Mutex;

use log::info;
use thiserror::Error;

use crate::{async_trait, APDUAnswer, APDUCommand, Exchange};

/// Errors produced by [`ScriptedTransport`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptedTransportError {
    /// A command was sent after all scripted answers were consumed
    #[error("no scripted answer left for command `{0}`")]
    Exhausted(String),
    /// A scripted answer is shorter than a status word
    #[error("scripted answer is too short")]
    TooShort,
}

/// Transport answering from a queue of raw answers (`data || SW1 SW2`)
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    answers: Mutex<VecDeque<Vec<u8>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer made of `data` followed by the status word `sw`
    pub fn push_answer(&self, data: &[u8], sw: u16) -> &Self {
        let mut answer = data.to_vec();
        answer.extend_from_slice(&sw.to_be_bytes());
        self.lock_answers().push_back(answer);
        self
    }

    /// Queue a bare `0x9000`
    pub fn push_ok(&self) -> &Self {
        self.push_answer(&[], 0x9000)
    }

    /// Serialized commands sent so far, oldest first
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.lock_answers().len()
    }

    fn lock_answers(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        // a poisoned queue only happens after a panicking test; keep going with its content
        self.answers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Exchange for ScriptedTransport {
    type Error = ScriptedTransportError;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        let serialized = command.serialize();
        info!("[{:3}] << {}", serialized.len(), hex::encode(&serialized));

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(serialized.clone());
        }

        let answer = self
            .lock_answers()
            .pop_front()
            .ok_or_else(|| ScriptedTransportError::Exhausted(hex::encode(&serialized)))?;

        info!("[{:3}] >> {}", answer.len(), hex::encode(&answer));

        APDUAnswer::from_answer(answer).map_err(|_| ScriptedTransportError::TooShort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send_through<E: Exchange>(
        transport: E,
        command: &APDUCommand<Vec<u8>>,
    ) -> Result<APDUAnswer<E::AnswerType>, E::Error> {
        transport.exchange(command).await
    }

    #[tokio::test]
    async fn replays_answers_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_ok().push_answer(&[0x01, 0x02], 0x6985);

        let command = APDUCommand {
            cla: 0xe0,
            ins: 0x06,
            p1: 0x00,
            p2: 0x00,
            data: Vec::new(),
        };

        let first = transport.exchange(&command).await.unwrap();
        assert_eq!(first.retcode(), 0x9000);

        let second = send_through(&transport, &command).await.unwrap();
        assert_eq!(second.data(), &[0x01, 0x02]);
        assert_eq!(second.retcode(), 0x6985);

        assert_eq!(transport.sent(), vec![vec![0xe0, 0x06, 0x00, 0x00, 0x00]; 2]);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn fails_when_exhausted() {
        let transport = ScriptedTransport::new();
        let command = APDUCommand {
            cla: 0xe0,
            ins: 0x02,
            p1: 0x00,
            p2: 0x00,
            data: vec![0xaa],
        };

        let err = transport.exchange(&command).await.unwrap_err();
        assert_eq!(
            err,
            ScriptedTransportError::Exhausted("e002000001aa".to_string())
        );
    }
}
