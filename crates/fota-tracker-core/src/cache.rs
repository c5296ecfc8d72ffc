//! Snapshot persistence
//!
//! Each (device model, variant) feed keeps exactly one snapshot on disk:
//! `{data_dir}/{model}_{variant}.json`. Files are overwritten wholesale after
//! every successful fetch; a missing file simply means the feed has not been
//! observed yet.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::firmware::{FirmwareVariant, Snapshot};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Corrupt snapshot {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Storage for the last observed snapshot of each feed
pub trait SnapshotStore {
    /// Load the stored snapshot, or `None` if the feed was never observed
    fn load(&self, model: &str, variant: FirmwareVariant) -> Result<Option<Snapshot>, CacheError>;

    /// Replace the stored snapshot
    fn save(
        &self,
        model: &str,
        variant: FirmwareVariant,
        snapshot: &Snapshot,
    ) -> Result<(), CacheError>;
}

/// JSON files in a data directory, one per feed
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    /// Directory holding the snapshot files
    pub base_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the path where a feed's snapshot is stored
    pub fn snapshot_path(&self, model: &str, variant: FirmwareVariant) -> PathBuf {
        self.base_dir.join(format!("{}_{}.json", model, variant.as_str()))
    }

    fn read_snapshot(path: &Path) -> Result<Snapshot, CacheError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        snapshot
            .validate()
            .map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(snapshot)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, model: &str, variant: FirmwareVariant) -> Result<Option<Snapshot>, CacheError> {
        let path = self.snapshot_path(model, variant);
        if !path.exists() {
            debug!(path = %path.display(), "No stored snapshot");
            return Ok(None);
        }
        Self::read_snapshot(&path).map(Some)
    }

    fn save(
        &self,
        model: &str,
        variant: FirmwareVariant,
        snapshot: &Snapshot,
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.base_dir)?;

        // Four-space indentation, same as existing snapshot files
        let mut content = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
        snapshot.serialize(&mut serializer)?;

        let path = self.snapshot_path(model, variant);
        std::fs::write(&path, content)?;
        debug!(path = %path.display(), versions = snapshot.versions.len(), "Saved snapshot");
        Ok(())
    }
}
