//! File-backed draft store: one JSON file per draft id.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::PathBuf;

use super::{DraftStore, StoreError};
use crate::models::{Draft, DraftId, SyncStatus};

/// Durable draft store that keeps each draft as a JSON file under a data
/// directory.
///
/// Writes go through a temp file followed by a rename, so a record is
/// either fully replaced or untouched.
#[derive(Clone, Debug)]
pub struct FsDraftStore {
    data_dir: PathBuf,
}

impl FsDraftStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the record path for a draft id.
    pub fn path(&self, id: &DraftId) -> PathBuf {
        self.data_dir.join(format!("{}.json", id))
    }

    fn classify_io(path: PathBuf, e: io::Error) -> StoreError {
        // Restricted storage mode shows up as permission errors.
        if e.kind() == io::ErrorKind::PermissionDenied {
            StoreError::Unavailable(format!("{}: {}", path.display(), e))
        } else {
            StoreError::Io(path, e)
        }
    }

    fn read_record(&self, path: PathBuf) -> Result<Option<Draft>, StoreError> {
        match fs::read(&path) {
            Ok(bytes) => {
                let draft = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Corrupt(path, e))?;
                Ok(Some(draft))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::classify_io(path, e)),
        }
    }
}

#[async_trait]
impl DraftStore for FsDraftStore {
    async fn put(&self, draft: &Draft) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| Self::classify_io(self.data_dir.clone(), e))?;

        let path = self.path(&draft.id);
        let bytes = serde_json::to_vec(draft)
            .map_err(|e| StoreError::Corrupt(path.clone(), e))?;

        // Temp file + rename keeps the record atomic per write.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| Self::classify_io(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::classify_io(path, e))?;

        Ok(())
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>, StoreError> {
        self.read_record(self.path(id))
    }

    async fn get_all(&self, status: Option<SyncStatus>) -> Result<Vec<Draft>, StoreError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::classify_io(self.data_dir.clone(), e)),
        };

        let mut drafts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::classify_io(self.data_dir.clone(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(path) {
                Ok(Some(draft)) => {
                    if status.is_none() || status == Some(draft.sync_status) {
                        drafts.push(draft);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // One corrupt record should not hide the rest.
                    tracing::warn!("skipping unreadable draft record: {}", e);
                }
            }
        }

        Ok(drafts)
    }

    async fn delete(&self, id: &DraftId) -> Result<(), StoreError> {
        let path = self.path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::classify_io(path, e)),
        }
    }
}
