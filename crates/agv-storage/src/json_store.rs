//! File-backed metadata table
//!
//! Loads entirely into memory and rewrites the JSON file atomically
//! (write temp, then rename) after every mutation. Suitable for the CLI and
//! single-process deployments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use agv_core::{FileMetadataRecord, StoreError, StoreResult};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::metadata::MetadataStore;

pub struct JsonMetadataStore {
    path: PathBuf,
    rows: Mutex<HashMap<String, FileMetadataRecord>>,
}

impl JsonMetadataStore {
    /// Load or create a table at `path`. A missing file starts empty.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let rows = match tokio::fs::read(path).await {
            Ok(content) => serde_json::from_slice(&content).map_err(|e| {
                StoreError::Serialization(format!("parsing {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, rows: &HashMap<String, FileMetadataRecord>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(rows)
            .map_err(|e| StoreError::Serialization(format!("serializing metadata: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn insert(&self, record: FileMetadataRecord) -> StoreResult<()> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        let id = record.id.clone();
        rows.insert(id.clone(), record);

        if let Err(e) = self.flush(&rows).await {
            rows.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    async fn select(&self, id: &str) -> StoreResult<FileMetadataRecord> {
        self.rows
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut rows = self.rows.lock().await;
        let removed = rows
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Err(e) = self.flush(&rows).await {
            rows.insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }

    async fn list_by(
        &self,
        user_id: &str,
        file_type: Option<&str>,
    ) -> StoreResult<Vec<FileMetadataRecord>> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|r| r.matches(user_id, file_type))
            .cloned()
            .collect())
    }
}
