//! File-backed snapshot store
//!
//! One JSON blob at a configured path. Saves go through a sibling temp file
//! followed by an atomic rename, so a reader never observes a half-written
//! snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::{RegistryError, RegistryResult, Snapshot};

use super::SnapshotStore;

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Persistence {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let bytes = serde_json::to_vec(snapshot).map_err(|e| RegistryError::SnapshotDecode {
            reason: e.to_string(),
        })?;

        // Literal `.tmp` suffix, not a replaced extension: `snap.json` stages
        // through `snap.json.tmp`, which cannot collide with a sibling file.
        let tmp = PathBuf::from(format!("{}.tmp", self.path.display()));
        fs::write(&tmp, &bytes).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), version = snapshot.version, "snapshot saved");
        Ok(())
    }

    fn load(&self) -> RegistryResult<Option<Snapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let snapshot =
            serde_json::from_slice(&bytes).map_err(|e| RegistryError::SnapshotDecode {
                reason: e.to_string(),
            })?;
        Ok(Some(snapshot))
    }
}
