//! Metadata table seam and an in-memory implementation
//!
//! The hosted deployment backs this with a relational `file_metadata` table;
//! the vault only needs insert / select / delete / list-by-owner.

use std::collections::HashMap;
use std::sync::Arc;

use agv_core::{FileMetadataRecord, StoreError, StoreResult};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new row. Fails with `AlreadyExists` on a duplicate id.
    async fn insert(&self, record: FileMetadataRecord) -> StoreResult<()>;

    /// Fetch a row by id. Fails with `NotFound` if absent.
    async fn select(&self, id: &str) -> StoreResult<FileMetadataRecord>;

    /// Delete a row by id. Fails with `NotFound` if absent.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Rows owned by `user_id`, optionally narrowed to one category.
    async fn list_by(
        &self,
        user_id: &str,
        file_type: Option<&str>,
    ) -> StoreResult<Vec<FileMetadataRecord>>;
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    async fn insert(&self, record: FileMetadataRecord) -> StoreResult<()> {
        (**self).insert(record).await
    }

    async fn select(&self, id: &str) -> StoreResult<FileMetadataRecord> {
        (**self).select(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        (**self).delete(id).await
    }

    async fn list_by(
        &self,
        user_id: &str,
        file_type: Option<&str>,
    ) -> StoreResult<Vec<FileMetadataRecord>> {
        (**self).list_by(user_id, file_type).await
    }
}

/// Process-local metadata table. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<HashMap<String, FileMetadataRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: FileMetadataRecord) -> StoreResult<()> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        rows.insert(record.id.clone(), record);
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
        self.rows
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    pub(crate) fn record(id: &str, user: &str, category: &str) -> FileMetadataRecord {
        FileMetadataRecord {
            id: id.into(),
            user_id: user.into(),
            file_type: category.into(),
            file_name: format!("{id}.pdf"),
            file_size: 10,
            original_type: "application/pdf".into(),
            storage_path: format!("{user}/{category}/{id}.encrypted"),
            encrypted: true,
            checksum: "00".repeat(32),
            uploaded_at: Utc::now() - Duration::seconds(id.len() as i64),
        }
    }

    #[tokio::test]
    async fn insert_select_delete() {
        let store = MemoryMetadataStore::new();
        store.insert(record("a", "alice", "kyc")).await.unwrap();

        assert_eq!(store.select("a").await.unwrap().user_id, "alice");

        store.delete("a").await.unwrap();
        assert!(matches!(store.select("a").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("a").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let store = MemoryMetadataStore::new();
        store.insert(record("a", "alice", "kyc")).await.unwrap();
        let err = store.insert(record("a", "bob", "kyc")).await.unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.select("a").await.unwrap().user_id, "alice");
    }

    #[tokio::test]
    async fn list_by_owner_and_category() {
        let store = MemoryMetadataStore::new();
        store.insert(record("a", "alice", "kyc")).await.unwrap();
        store.insert(record("b", "alice", "bank_statement")).await.unwrap();
        store.insert(record("c", "bob", "kyc")).await.unwrap();

        assert_eq!(store.list_by("alice", None).await.unwrap().len(), 2);

        let kyc = store.list_by("alice", Some("kyc")).await.unwrap();
        assert_eq!(kyc.len(), 1);
        assert_eq!(kyc[0].id, "a");

        assert!(store.list_by("carol", None).await.unwrap().is_empty());
    }
}
