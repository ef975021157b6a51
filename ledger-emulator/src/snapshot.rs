// SPDX-License-Identifier: Apache-2.0

//! Screenshot storage and comparison against reference images

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    config::{DeviceModel, SnapshotConfig},
    errors::SessionError,
};

/// File name of the `index`-th snapshot of a scenario
pub fn snapshot_file_name(index: usize) -> String {
    format!("{:05}.png", index)
}

/// Whether two PNG screenshots show the same pixels
///
/// Images are compared after decoding to RGB, so two encodings of the same
/// screen are equal.
pub fn same_screen(a: &[u8], b: &[u8]) -> Result<bool, SessionError> {
    if a == b {
        return Ok(true);
    }

    let a = image::load_from_memory(a)?.to_rgb8();
    let b = image::load_from_memory(b)?.to_rgb8();

    Ok(a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw())
}

/// Snapshot directories of one device model
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    config: SnapshotConfig,
    model: DeviceModel,
}

impl SnapshotStore {
    pub fn new(config: SnapshotConfig, model: DeviceModel) -> Self {
        Self { config, model }
    }

    pub fn is_updating(&self) -> bool {
        self.config.update
    }

    fn scenario_dir(&self, root: &Path, scenario: &str) -> PathBuf {
        root.join(scenario).join(self.model.as_str())
    }

    pub fn captured_path(&self, scenario: &str, index: usize) -> PathBuf {
        self.scenario_dir(&self.config.tmp_dir, scenario)
            .join(snapshot_file_name(index))
    }

    pub fn golden_path(&self, scenario: &str, index: usize) -> PathBuf {
        self.scenario_dir(&self.config.golden_dir, scenario)
            .join(snapshot_file_name(index))
    }

    /// Empty the capture directory of `scenario`
    pub async fn reset(&self, scenario: &str) -> Result<(), SessionError> {
        let dir = self.scenario_dir(&self.config.tmp_dir, scenario);
        if tokio::fs::metadata(&dir).await.is_ok() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        if self.config.update {
            tokio::fs::create_dir_all(self.scenario_dir(&self.config.golden_dir, scenario)).await?;
        }
        Ok(())
    }

    /// Store a capture, and the reference too when updating
    pub async fn record(
        &self,
        scenario: &str,
        index: usize,
        png: &[u8],
    ) -> Result<PathBuf, SessionError> {
        let captured = self.captured_path(scenario, index);
        tokio::fs::write(&captured, png).await?;
        debug!("snapshot {}", captured.display());

        if self.config.update {
            let golden = self.golden_path(scenario, index);
            tokio::fs::write(&golden, png).await?;
            info!("updated reference {}", golden.display());
        }
        Ok(captured)
    }

    /// Compare captures `0..count` with their references
    pub async fn compare(&self, scenario: &str, count: usize) -> Result<(), SessionError> {
        for index in 0..count {
            let captured = self.captured_path(scenario, index);
            let golden = self.golden_path(scenario, index);

            let expected = match tokio::fs::read(&golden).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SessionError::MissingSnapshot(golden))
                }
                Err(err) => return Err(err.into()),
            };
            let actual = tokio::fs::read(&captured).await?;

            if !same_screen(&actual, &expected)? {
                return Err(SessionError::SnapshotMismatch { captured, golden });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::png;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledger-emulator-{}-{}", name, std::process::id()))
    }

    #[test]
    fn same_pixels_compare_equal() {
        assert!(same_screen(&png(0), &png(0)).unwrap());
        assert!(!same_screen(&png(0), &png(255)).unwrap());
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = same_screen(b"not a png", &png(0)).unwrap_err();
        assert!(matches!(err, SessionError::Image(_)));
    }

    #[test]
    fn paths_follow_scenario_and_model() {
        let store = SnapshotStore::new(
            SnapshotConfig::new("golden").with_tmp_dir("tmp"),
            DeviceModel::NanoX,
        );
        assert_eq!(
            store.golden_path("nanox_transfer", 12),
            PathBuf::from("golden/nanox_transfer/nanox/00012.png")
        );
        assert_eq!(
            store.captured_path("nanox_transfer", 0),
            PathBuf::from("tmp/nanox_transfer/nanox/00000.png")
        );
    }

    #[tokio::test]
    async fn update_then_compare() {
        let root = scratch_dir("update");
        let config = SnapshotConfig::new(root.join("golden")).with_tmp_dir(root.join("tmp"));

        let updating = SnapshotStore::new(config.clone().updating(true), DeviceModel::NanoS);
        updating.reset("transfer").await.unwrap();
        updating.record("transfer", 0, &png(1)).await.unwrap();
        updating.record("transfer", 1, &png(4)).await.unwrap();

        let comparing = SnapshotStore::new(config, DeviceModel::NanoS);
        comparing.reset("transfer").await.unwrap();
        comparing.record("transfer", 0, &png(1)).await.unwrap();
        comparing.record("transfer", 1, &png(9)).await.unwrap();

        assert!(comparing.compare("transfer", 1).await.is_ok());
        let err = comparing.compare("transfer", 2).await.unwrap_err();
        assert!(matches!(err, SessionError::SnapshotMismatch { .. }));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn missing_reference() {
        let root = scratch_dir("missing");
        let store = SnapshotStore::new(
            SnapshotConfig::new(root.join("golden")).with_tmp_dir(root.join("tmp")),
            DeviceModel::NanoS,
        );
        store.reset("empty").await.unwrap();
        store.record("empty", 0, &png(0)).await.unwrap();

        let err = store.compare("empty", 1).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingSnapshot(_)));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
