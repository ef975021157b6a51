// SPDX-License-Identifier: Apache-2.0

//! Re-sign a transaction copied from a block explorer inside the emulator
//!
//! This example shows how to:
//! 1. Strip the signature of an explorer transaction
//! 2. Start the emulator described by the `LEDGER_*` environment
//! 3. Sign the transaction and click through the review
//!
//! ```text
//! LEDGER_ELF_DIR=elfs cargo run -p ledger-demos --bin replay_etherscan -- \
//!     0xf86c...
//! ```

use std::{error::Error, path::PathBuf};

use clap::Parser;
use futures::FutureExt;
use ledger_emulator::{with_session, ClickSchedule, DeviceModel, SessionConfig, SnapshotConfig};
use ledger_eth_app::{EtherscanAdapter, EthereumApp, DEFAULT_LEGACY_CHAIN_ID};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Signed transaction as shown by the explorer, hex with or without `0x`
    raw_tx: String,

    /// Derivation path of the signing key
    #[arg(long, short = 'p', default_value = "44'/60'/0'/0/0")]
    path: String,

    /// Chain id put in the EIP-155 trailer of legacy transactions
    #[arg(long, default_value_t = DEFAULT_LEGACY_CHAIN_ID)]
    chain_id: u64,

    /// Device model, overrides `LEDGER_MODEL`
    #[arg(long, short = 'm')]
    model: Option<DeviceModel>,

    /// Review navigation: right clicks when positive, left when negative, both when zero
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = [9, -1, 0]
    )]
    clicks: Vec<i32>,

    /// Record the review screens in this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Print the unsigned payload and exit without starting the emulator
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize logging
    env_logger::init();

    let args = CliArgs::parse();

    let adapter = EtherscanAdapter::new().with_legacy_chain_id(args.chain_id);
    let unsigned = adapter.unsigned_payload_hex(&args.raw_tx)?;
    println!("📝 Unsigned payload: {}", unsigned);

    if args.dry_run {
        return Ok(());
    }

    let mut config = match &args.snapshot_dir {
        Some(dir) => SessionConfig::from_env()?
            .with_snapshots(SnapshotConfig::new(dir).updating(true)),
        None => SessionConfig::from_env()?.without_snapshots(),
    };
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    let model = config.model;
    let schedule = ClickSchedule::from_zemu(&args.clicks);

    println!("🚀 Starting emulator ({})...", model);

    let CliArgs { raw_tx, path, .. } = args;
    let signature = with_session(config, move |session| {
        async move {
            println!("✅ Application is ready");

            let app = EthereumApp::new(session.transport()).with_adapter(adapter);
            let pending = app.sign_etherscan_transaction(&path, &raw_tx);

            println!("🔐 Reviewing transaction ({} presses)...", schedule.press_count());
            let signature = session
                .approve(
                    pending,
                    session.main_menu_snapshot(),
                    &format!("{}_replay_etherscan", model),
                    &schedule,
                )
                .await??;
            Ok::<_, BoxError>(signature)
        }
        .boxed()
    })
    .await?;

    println!("✅ Transaction signed:");
    println!("  v: {}", signature.v);
    println!("  r: {}", signature.r);
    println!("  s: {}", signature.s);

    Ok(())
}
