// SPDX-License-Identifier: Apache-2.0

//! Immutable emulator session configuration

use std::{
    env,
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Text shown by the Ethereum app main menu once booted
pub const DEFAULT_START_TEXT: &str = "is ready";
/// Upper bound for the review screen to replace the main menu
pub const DEFAULT_SCREEN_CHANGE_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound for a whole scenario, start and close excluded
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(1000);
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_APDU_PORT: u16 = 9999;
pub const DEFAULT_API_PORT: u16 = 5000;
pub const DEFAULT_SPECULOS_BIN: &str = "speculos";
/// Mnemonic the reference signatures were produced with
pub const DEFAULT_SEED: &str =
    "equip will roof matter pink blind book anxiety banner elbow sun young";

pub const ENV_ELF_DIR: &str = "LEDGER_ELF_DIR";
pub const ENV_SPECULOS_BIN: &str = "SPECULOS_BIN";
pub const ENV_MODEL: &str = "LEDGER_MODEL";
pub const ENV_SNAPSHOTS_DIR: &str = "LEDGER_SNAPSHOTS_DIR";
pub const ENV_UPDATE_SNAPSHOTS: &str = "LEDGER_UPDATE_SNAPSHOTS";

/// Emulated device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceModel {
    NanoS,
    NanoX,
    NanoSP,
}

impl DeviceModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceModel::NanoS => "nanos",
            DeviceModel::NanoX => "nanox",
            DeviceModel::NanoSP => "nanosp",
        }
    }

    /// Image of application `app` built for this model, `<dir>/<app>_<model>.elf`
    pub fn elf_path(&self, dir: &Path, app: &str) -> PathBuf {
        dir.join(format!("{}_{}.elf", app, self.as_str()))
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceModel {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nanos" => Ok(DeviceModel::NanoS),
            "nanox" => Ok(DeviceModel::NanoX),
            "nanosp" => Ok(DeviceModel::NanoSP),
            other => Err(SessionError::Config(format!("unknown device model `{}`", other))),
        }
    }
}

/// Where snapshots are written and what they are compared against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Reference images, `<golden_dir>/<scenario>/<model>/<index>.png`
    pub golden_dir: PathBuf,
    /// Captured images, same layout
    pub tmp_dir: PathBuf,
    /// Overwrite the references instead of comparing
    pub update: bool,
}

impl SnapshotConfig {
    pub fn new(golden_dir: impl Into<PathBuf>) -> Self {
        Self {
            golden_dir: golden_dir.into(),
            tmp_dir: env::temp_dir().join("ledger-emulator-snapshots"),
            update: false,
        }
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = tmp_dir.into();
        self
    }

    pub fn updating(mut self, update: bool) -> Self {
        self.update = update;
        self
    }
}

/// Everything needed to start one emulated device
///
/// Built once and handed to [`crate::with_session`]; the session never
/// mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub model: DeviceModel,
    /// Directory holding the `.elf` images
    pub elf_dir: PathBuf,
    /// Application started by the emulator
    pub app_elf: PathBuf,
    /// Libraries loaded next to the application, `name -> image`
    pub libraries: Vec<(String, PathBuf)>,
    pub speculos_bin: PathBuf,
    pub seed: String,
    pub host: IpAddr,
    pub apdu_port: u16,
    pub api_port: u16,
    pub start_delay: Duration,
    pub start_timeout: Duration,
    pub start_text: String,
    pub screen_change_timeout: Duration,
    pub test_timeout: Duration,
    pub snapshots: Option<SnapshotConfig>,
}

impl SessionConfig {
    /// Ethereum application for `model`, taken from `elf_dir`
    pub fn new(model: DeviceModel, elf_dir: impl Into<PathBuf>) -> Self {
        let elf_dir = elf_dir.into();
        let app_elf = model.elf_path(&elf_dir, "ethereum");

        Self {
            model,
            elf_dir,
            app_elf,
            libraries: Vec::new(),
            speculos_bin: PathBuf::from(DEFAULT_SPECULOS_BIN),
            seed: DEFAULT_SEED.to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            apdu_port: DEFAULT_APDU_PORT,
            api_port: DEFAULT_API_PORT,
            start_delay: DEFAULT_START_DELAY,
            start_timeout: DEFAULT_START_TIMEOUT,
            start_text: DEFAULT_START_TEXT.to_string(),
            screen_change_timeout: DEFAULT_SCREEN_CHANGE_TIMEOUT,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            snapshots: None,
        }
    }

    /// Read the configuration from `LEDGER_*` and `SPECULOS_BIN`
    ///
    /// Unset variables fall back to `elfs/`, `nanos`, `speculos` and
    /// `snapshots/`.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = match lookup(ENV_MODEL) {
            Some(model) => model.parse()?,
            None => DeviceModel::NanoS,
        };
        let elf_dir = lookup(ENV_ELF_DIR).unwrap_or_else(|| "elfs".to_string());

        let mut config = Self::new(model, elf_dir);
        if let Some(bin) = lookup(ENV_SPECULOS_BIN) {
            config.speculos_bin = PathBuf::from(bin);
        }

        let update = lookup(ENV_UPDATE_SNAPSHOTS)
            .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let golden_dir = lookup(ENV_SNAPSHOTS_DIR).unwrap_or_else(|| "snapshots".to_string());
        config.snapshots = Some(SnapshotConfig::new(golden_dir).updating(update));

        Ok(config)
    }

    pub fn with_model(mut self, model: DeviceModel) -> Self {
        self.model = model;
        self.app_elf = model.elf_path(&self.elf_dir, "ethereum");
        self
    }

    pub fn with_app(mut self, app_elf: impl Into<PathBuf>) -> Self {
        self.app_elf = app_elf.into();
        self
    }

    pub fn with_library(mut self, name: impl Into<String>, elf: impl Into<PathBuf>) -> Self {
        self.libraries.push((name.into(), elf.into()));
        self
    }

    /// Run the clone application `app` with Ethereum loaded as its library
    pub fn clone_chain(self, app: &str) -> Self {
        let clone_elf = self.model.elf_path(&self.elf_dir, app);
        let ethereum_elf = self.model.elf_path(&self.elf_dir, "ethereum");
        self.with_app(clone_elf).with_library("Ethereum", ethereum_elf)
    }

    pub fn with_speculos_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.speculos_bin = bin.into();
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_ports(mut self, apdu_port: u16, api_port: u16) -> Self {
        self.apdu_port = apdu_port;
        self.api_port = api_port;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_start_text(mut self, text: impl Into<String>) -> Self {
        self.start_text = text.into();
        self
    }

    pub fn with_screen_change_timeout(mut self, timeout: Duration) -> Self {
        self.screen_change_timeout = timeout;
        self
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotConfig) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn without_snapshots(mut self) -> Self {
        self.snapshots = None;
        self
    }

    pub fn apdu_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.apdu_port)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", SocketAddr::new(self.host, self.api_port))
    }

    /// Command line handed to the emulator launcher
    pub fn speculos_args(&self) -> Vec<String> {
        let mut args = vec![
            self.app_elf.display().to_string(),
            "--model".to_string(),
            self.model.to_string(),
            "--display".to_string(),
            "headless".to_string(),
            "--seed".to_string(),
            self.seed.clone(),
            "--apdu-port".to_string(),
            self.apdu_port.to_string(),
            "--api-port".to_string(),
            self.api_port.to_string(),
        ];

        for (name, elf) in &self.libraries {
            args.push("-l".to_string());
            args.push(format!("{}:{}", name, elf.display()));
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.model, DeviceModel::NanoS);
        assert_eq!(config.app_elf, PathBuf::from("elfs/ethereum_nanos.elf"));
        assert_eq!(config.speculos_bin, PathBuf::from("speculos"));
        assert_eq!(config.screen_change_timeout, Duration::from_secs(60));
        assert_eq!(config.test_timeout, Duration::from_secs(1000));
        assert_eq!(config.start_text, "is ready");

        let snapshots = config.snapshots.unwrap();
        assert_eq!(snapshots.golden_dir, PathBuf::from("snapshots"));
        assert!(!snapshots.update);
    }

    #[test]
    fn environment_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ENV_MODEL, "NanoX"),
            (ENV_ELF_DIR, "/opt/elfs"),
            (ENV_SPECULOS_BIN, "/usr/local/bin/speculos.py"),
            (ENV_SNAPSHOTS_DIR, "/tmp/golden"),
            (ENV_UPDATE_SNAPSHOTS, "1"),
        ]))
        .unwrap();

        assert_eq!(config.model, DeviceModel::NanoX);
        assert_eq!(config.app_elf, PathBuf::from("/opt/elfs/ethereum_nanox.elf"));
        assert_eq!(
            config.speculos_bin,
            PathBuf::from("/usr/local/bin/speculos.py")
        );
        assert!(config.snapshots.unwrap().update);
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let err = SessionConfig::from_lookup(lookup(&[(ENV_MODEL, "blue")])).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn clone_chain_loads_ethereum_as_library() {
        let config = SessionConfig::new(DeviceModel::NanoS, "elfs")
            .with_ports(40001, 5001)
            .clone_chain("ethereum_classic");

        assert_eq!(
            config.speculos_args(),
            vec![
                "elfs/ethereum_classic_nanos.elf",
                "--model",
                "nanos",
                "--display",
                "headless",
                "--seed",
                DEFAULT_SEED,
                "--apdu-port",
                "40001",
                "--api-port",
                "5001",
                "-l",
                "Ethereum:elfs/ethereum_nanos.elf",
            ]
        );
    }

    #[test]
    fn model_names_parse_back() {
        for model in [DeviceModel::NanoS, DeviceModel::NanoX, DeviceModel::NanoSP] {
            assert_eq!(model.as_str().parse::<DeviceModel>().unwrap(), model);
        }
        assert_eq!(SessionConfig::new(DeviceModel::NanoSP, "e").api_url(), "http://127.0.0.1:5000");
    }
}
