//! Blob store seam and its OpenDAL implementation
//!
//! Paths are bucket-relative keys such as `user-a/kyc/<uuid>.encrypted`.

use std::sync::Arc;

use agv_core::{StoreError, StoreResult};
use async_trait::async_trait;
use opendal::{EntryMode, ErrorKind, Operator};
use tracing::debug;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a new blob. Fails with `AlreadyExists` rather than overwriting.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StoreResult<()>;

    async fn get(&self, path: &str) -> StoreResult<Vec<u8>>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Keys of all blobs under `prefix`, recursively.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StoreResult<()> {
        (**self).put(path, bytes).await
    }

    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        (**self).get(path).await
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).list(prefix).await
    }
}

fn map_err(path: &str, e: opendal::Error) -> StoreError {
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists | ErrorKind::ConditionNotMatch => {
            StoreError::AlreadyExists(path.to_string())
        }
        _ => StoreError::Backend(format!("{path}: {e}")),
    }
}

#[async_trait]
impl BlobStore for Operator {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StoreResult<()> {
        // Keys carry a fresh UUID, so the check-then-write window is not contended.
        if self.exists(path).await.map_err(|e| map_err(path, e))? {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        let len = bytes.len();
        self.write(path, bytes).await.map_err(|e| map_err(path, e))?;
        debug!(path, bytes = len, "blob written");
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let buf = self.read(path).await.map_err(|e| map_err(path, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        Operator::delete(self, path)
            .await
            .map_err(|e| map_err(path, e))?;
        debug!(path, "blob deleted");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        let entries = match self.list_with(&dir).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_err(&dir, e)),
        };

        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().mode() == EntryMode::FILE)
            .map(|entry| entry.path().to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
