// SPDX-License-Identifier: Apache-2.0

//! Decode an APDU replay file
//!
//! One hex APDU per line, optionally prefixed with `=>`. Lines starting with
//! `<=` are device answers and are echoed as is, `#` starts a comment.
//! SIGN ETH TRANSACTION chunks are joined back and the derivation path and
//! RLP fields of the transaction are printed.

use std::{error::Error, fmt::Write as _, path::PathBuf};

use clap::Parser;
use ledger_apdu::APDUCommand;
use ledger_eth_app::{
    instructions::{ins, p1_chunk},
    rlp::{split_envelope, RlpItem},
    utils::decode_bip32_path,
    BipPath,
};
use ledger_transport_speculos::LedgerTcpError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Replay file
    file: PathBuf,

    /// Reject commands whose length byte does not match the payload
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    strict: bool,
}

/// A transaction rebuilt from its SIGN ETH TRANSACTION chunks
#[derive(Debug, PartialEq)]
struct DecodedTransaction {
    path: BipPath,
    tx_type: Option<u8>,
    fields: Vec<RlpItem>,
}

#[derive(Default)]
struct Replay {
    chunks: Option<Vec<u8>>,
    transactions: Vec<Result<DecodedTransaction, String>>,
}

impl Replay {
    fn push(&mut self, command: &APDUCommand<Vec<u8>>) {
        if command.ins != ins::SIGN_ETH_TRANSACTION {
            self.flush();
            return;
        }

        match command.p1 {
            p1_chunk::FIRST_DATA_BLOCK => {
                self.flush();
                self.chunks = Some(command.data.clone());
            }
            p1_chunk::SUBSEQUENT_DATA_BLOCK => match self.chunks.as_mut() {
                Some(chunks) => chunks.extend_from_slice(&command.data),
                None => self
                    .transactions
                    .push(Err("continuation without a first chunk".to_string())),
            },
            p1 => self
                .transactions
                .push(Err(format!("unexpected P1 {:#04x}", p1))),
        }
    }

    fn flush(&mut self) {
        if let Some(data) = self.chunks.take() {
            self.transactions.push(decode_transaction(&data));
        }
    }

    fn finish(mut self) -> Vec<Result<DecodedTransaction, String>> {
        self.flush();
        self.transactions
    }
}

fn decode_transaction(data: &[u8]) -> Result<DecodedTransaction, String> {
    let (path, used) =
        decode_bip32_path::<LedgerTcpError>(data).map_err(|e| e.to_string())?;

    let (tx_type, body) = split_envelope(&data[used..]);
    let fields = match RlpItem::decode_exact(body).map_err(|e| e.to_string())? {
        RlpItem::List(fields) => fields,
        RlpItem::Bytes(_) => return Err("transaction is not an RLP list".to_string()),
    };

    Ok(DecodedTransaction {
        path,
        tx_type,
        fields,
    })
}

/// Hex of the command line, `None` for answers, comments and blank lines
fn command_hex(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("<=") {
        return None;
    }
    Some(line.strip_prefix("=>").unwrap_or(line).trim())
}

fn describe(item: &RlpItem) -> String {
    match item {
        RlpItem::Bytes(bytes) if bytes.is_empty() => "(empty)".to_string(),
        RlpItem::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        RlpItem::List(items) => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", describe(item));
            }
            out.push(']');
            out
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    let args = CliArgs::parse();
    let replay_text = std::fs::read_to_string(&args.file)?;

    println!("📂 Decoding {}", args.file.display());

    let mut replay = Replay::default();
    for (number, line) in replay_text.lines().enumerate() {
        let Some(hex) = command_hex(line) else {
            if line.trim_start().starts_with("<=") {
                println!("{:>4}  {}", number + 1, line.trim());
            }
            continue;
        };

        let decoded = if args.strict {
            APDUCommand::from_hex_checked(hex)
        } else {
            APDUCommand::from_hex(hex)
        };
        let command = match decoded {
            Ok(command) => command,
            Err(e) => {
                eprintln!("❌ line {}: {}", number + 1, e);
                continue;
            }
        };

        println!(
            "{:>4}  cla={:#04x} ins={:#04x} ({}) p1={:#04x} p2={:#04x} len={}",
            number + 1,
            command.cla,
            command.ins,
            ins::name(command.ins).unwrap_or("UNKNOWN"),
            command.p1,
            command.p2,
            command.data.len()
        );
        replay.push(&command);
    }

    for transaction in replay.finish() {
        match transaction {
            Ok(tx) => {
                println!("\n🔐 Transaction");
                println!("  Path: {}", tx.path);
                match tx.tx_type {
                    Some(tx_type) => println!("  Type: {:#04x}", tx_type),
                    None => println!("  Type: legacy"),
                }
                for (i, field) in tx.fields.iter().enumerate() {
                    println!("  [{}] {}", i, describe(field));
                }
            }
            Err(e) => eprintln!("\n❌ Transaction could not be decoded: {}", e),
        }
    }

    Ok(())
}
