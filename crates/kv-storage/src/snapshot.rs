//! Atomic snapshot persistence: the full in-memory map is written to a
//! temp file, fsynced, then renamed over the live snapshot path so readers
//! never observe a partially-written snapshot.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use kv_types::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::StorageResult;
use crate::wal::Wal;

pub struct SnapshotStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_path = path.clone();
        tmp_path.set_extension("snapshot.tmp");
        SnapshotStore { path, tmp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot if present and well-formed. Returns `Ok(None)` if
    /// there is no snapshot file yet or if it fails to decode — in the
    /// latter case recovery proceeds from an empty map plus the full WAL.
    pub async fn load(&self) -> StorageResult<Option<IndexMap<String, Value>>> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(data) => Ok(Some(data)),
            Err(_) => {
                tracing::warn!("snapshot file failed to decode, starting from empty state");
                Ok(None)
            }
        }
    }

    /// Writes `data` to a temp file, fsyncs it, atomically renames it over
    /// the live snapshot path, then truncates `wal`. Any failure before the
    /// rename leaves the existing snapshot and WAL untouched and removes the
    /// temp file.
    pub async fn snapshot(&self, data: &IndexMap<String, Value>, wal: &Wal) -> StorageResult<()> {
        match self.write_temp_and_rename(data).await {
            Ok(()) => {
                wal.truncate().await?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&self.tmp_path).await;
                Err(e)
            }
        }
    }

    async fn write_temp_and_rename(&self, data: &IndexMap<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec(data)?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.tmp_path)
            .await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path).await?;
        Ok(())
    }
}
