// SPDX-License-Identifier: Apache-2.0

//! Command implementations for Ethereum application

pub mod get_address;
pub mod get_config;
pub mod sign_message;
pub mod sign_transaction;

pub use get_address::*;
pub use get_config::*;
pub use sign_message::*;
pub use sign_transaction::*;
