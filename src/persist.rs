use crate::models::send_log::SendAttemptRecord;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("log file is not a valid record array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only send log backed by a single JSON array file.
///
/// Every mutation rewrites the whole file while holding the write lock, so
/// concurrent appends are serialized and none is lost.
pub struct SendLogStore {
    path: Option<PathBuf>,
    records: RwLock<Vec<SendAttemptRecord>>,
}

impl SendLogStore {
    /// Loads the log at `path`. Never fails: a missing file starts an empty log
    /// (persisted right away), an unreadable one starts empty and is left as is.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_records(&path).await {
            Ok(Some(records)) => {
                tracing::info!(path = %path.display(), entries = records.len(), "send log loaded");
                Self::with_records(Some(path), records)
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no send log found, starting fresh");
                let store = Self::with_records(Some(path), Vec::new());
                if let Err(e) = store.save().await {
                    tracing::warn!(error = %e, "could not create empty send log");
                }
                store
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "send log unreadable, starting empty");
                Self::with_records(Some(path), Vec::new())
            }
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::with_records(None, Vec::new())
    }

    fn with_records(path: Option<PathBuf>, records: Vec<SendAttemptRecord>) -> Self {
        Self {
            path,
            records: RwLock::new(records),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends and persists. The in-memory record is kept even when the
    /// write fails; the error is returned for the caller to log.
    pub async fn append(
        &self,
        mut record: SendAttemptRecord,
    ) -> (SendAttemptRecord, Result<(), StoreError>) {
        let mut w = self.records.write().await;
        if let Some(last) = w.last() {
            record.bump_id_after(last.id());
        }
        w.push(record.clone());
        let res = self.persist(&w).await;
        (record, res)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        let r = self.records.read().await;
        self.persist(&r).await
    }

    /// Newest first.
    pub async fn all(&self) -> Vec<SendAttemptRecord> {
        let r = self.records.read().await;
        r.iter().rev().cloned().collect()
    }

    /// The newest `n` records, newest first.
    pub async fn recent(&self, n: usize) -> Vec<SendAttemptRecord> {
        let r = self.records.read().await;
        r.iter().rev().take(n).cloned().collect()
    }

    /// Storage (append) order.
    pub async fn snapshot(&self) -> Vec<SendAttemptRecord> {
        self.records.read().await.clone()
    }

    pub async fn export_json(&self) -> Result<String, StoreError> {
        let r = self.records.read().await;
        Ok(serde_json::to_string_pretty(&*r)?)
    }

    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut w = self.records.write().await;
        w.clear();
        self.persist(&w).await
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(&self, records: &[SendAttemptRecord]) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(path, data).await?;
        tracing::debug!(path = %path.display(), entries = records.len(), "send log saved");
        Ok(())
    }
}

async fn read_records(path: &Path) -> Result<Option<Vec<SendAttemptRecord>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
