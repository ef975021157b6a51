// SPDX-License-Identifier: Apache-2.0

//! Emulator child process

use std::{path::PathBuf, process::Stdio};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};

use crate::{config::SessionConfig, errors::SessionError};

/// Running emulator, killed when dropped
pub struct EmulatorProcess {
    child: Child,
    bin: PathBuf,
}

impl EmulatorProcess {
    pub fn spawn(config: &SessionConfig) -> Result<Self, SessionError> {
        let args = config.speculos_args();
        info!("{} {}", config.speculos_bin.display(), args.join(" "));

        let mut child = Command::new(&config.speculos_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Launch {
                bin: config.speculos_bin.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, "stderr");
        }

        Ok(Self {
            child,
            bin: config.speculos_bin.clone(),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Fails if the emulator already exited
    pub fn ensure_running(&mut self) -> Result<(), SessionError> {
        match self.child.try_wait()? {
            None => Ok(()),
            Some(status) => Err(SessionError::EmulatorExited(status.to_string())),
        }
    }

    /// Kill the emulator and reap it
    pub async fn close(mut self) -> Result<(), SessionError> {
        if let Some(status) = self.child.try_wait()? {
            warn!("{} had already exited: {}", self.bin.display(), status);
            return Ok(());
        }

        self.child.kill().await?;
        debug!("{} stopped", self.bin.display());
        Ok(())
    }
}

fn forward_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "speculos", "[{}] {}", stream, line);
        }
    });
}
