// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction for Ledger devices and emulators

use std::ops::Deref;

pub use async_trait::async_trait;
pub use ledger_apdu::{
    APDUAnswer, APDUCommand, APDUDecodeError, APDUErrorCode, APDU_MAX_DATA_SIZE,
};

pub mod mock;

/// Use to talk to the ledger device
#[async_trait]
pub trait Exchange {
    /// Error defined by Transport used
    type Error;

    /// The concrete type containing the APDUAnswer
    type AnswerType: Deref<Target = [u8]> + Send;

    /// Send a command with the given transport and retrieve an answer or a transport error
    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync;
}

// A session hands out its transport by reference while it keeps ownership of
// the underlying connection.
#[async_trait]
impl<T> Exchange for &T
where
    T: Exchange + Send + Sync,
{
    type Error = T::Error;
    type AnswerType = T::AnswerType;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        (**self).exchange(command).await
    }
}
