//! Upload / download / delete orchestration over a blob store and a metadata table
//!
//! Invariant: every blob the vault writes is referenced by exactly one
//! metadata record. Uploads write the blob first and remove it again if the
//! record insert fails; deletes remove the blob before the record.

use std::time::Duration;

use agv_core::config::{CryptoConfig, KdfKind, VaultConfig};
use agv_core::types::storage_path;
use agv_core::{FileMetadataRecord, FileObject, StoreError};
use agv_crypto::{checksum, checksums_match, EncryptedPackage, KdfParams, PackageCipher};
use agv_storage::{BlobStore, MetadataStore};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::rate_limit::{RateLimitConfig, RateLimiter, Reservation};
use crate::validate::{check_path_component, FileValidator};

/// Extension of encrypted package blobs.
pub const ENCRYPTED_EXTENSION: &str = "encrypted";

/// Tunables for a [`Vault`], usually derived from [`VaultConfig`].
#[derive(Debug, Clone)]
pub struct VaultOptions {
    pub kdf: KdfParams,
    pub max_file_size: u64,
    pub rate_limit: RateLimitConfig,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            max_file_size: crate::validate::DEFAULT_MAX_FILE_SIZE,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl VaultOptions {
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            kdf: kdf_from_config(&config.crypto),
            max_file_size: config.limits.max_file_size,
            rate_limit: RateLimitConfig {
                max_uploads: config.limits.rate_limit_max,
                window: Duration::from_millis(config.limits.rate_limit_window_ms),
            },
        }
    }
}

fn kdf_from_config(crypto: &CryptoConfig) -> KdfParams {
    match crypto.kdf {
        KdfKind::Pbkdf2 => KdfParams::pbkdf2(crypto.pbkdf2_iterations),
        KdfKind::Argon2id => KdfParams::argon2id(
            crypto.argon2_mem_cost_kib,
            crypto.argon2_time_cost,
            crypto.argon2_parallelism,
        ),
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub file_id: String,
    pub storage_path: String,
    pub record: FileMetadataRecord,
}

/// Plaintext handed back by [`Vault::download_file`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file: FileObject,
    /// SHA-256 of `file.data`
    pub checksum: String,
    pub record: FileMetadataRecord,
}

/// Outcome of a passphrase-free integrity audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub file_id: String,
    pub storage_path: String,
    /// Checksum in the metadata record
    pub recorded_checksum: String,
    /// Checksum in the package header, or recomputed over a plain blob
    pub stored_checksum: String,
    pub encrypted: bool,
    pub matches: bool,
}

pub struct Vault<B, M> {
    blobs: B,
    metadata: M,
    cipher: PackageCipher,
    validator: FileValidator,
    limiter: RateLimiter,
}

impl<B, M> std::fmt::Debug for Vault<B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("cipher", &self.cipher)
            .field("validator", &self.validator)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl<B: BlobStore, M: MetadataStore> Vault<B, M> {
    pub fn new(blobs: B, metadata: M, options: VaultOptions) -> Self {
        Self::from_parts(
            blobs,
            metadata,
            PackageCipher::new(options.kdf),
            FileValidator::new(options.max_file_size),
            RateLimiter::new(options.rate_limit),
        )
    }

    /// Assemble from explicit components (custom clock, randomness, KDF cost).
    pub fn from_parts(
        blobs: B,
        metadata: M,
        cipher: PackageCipher,
        validator: FileValidator,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            blobs,
            metadata,
            cipher,
            validator,
            limiter,
        }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn reserve_slot(&self, identity: &str) -> VaultResult<Reservation<'_>> {
        self.limiter.reserve(identity).map_err(|retry_after| {
            warn!(identity, retry_after_ms = retry_after.as_millis() as u64, "upload rate limited");
            VaultError::RateLimited { retry_after }
        })
    }

    /// Validate, encrypt and store a file for `identity` under `category`.
    pub async fn upload_file(
        &self,
        file: &FileObject,
        identity: &str,
        category: &str,
        passphrase: &SecretString,
    ) -> VaultResult<UploadReceipt> {
        check_path_component(identity)?;
        check_path_component(category)?;
        let slot = self.reserve_slot(identity)?;
        self.validator.validate(Some(file))?;

        let cipher = self.cipher.clone();
        let owned = file.clone();
        let passphrase = SecretString::from(passphrase.expose_secret().to_owned());
        let package = tokio::task::spawn_blocking(move || cipher.encrypt(&owned, &passphrase))
            .await?
            .map_err(|e| {
                error!(identity, error = %e, "encryption failed");
                VaultError::from(e)
            })?;
        let body = package.to_bytes()?;

        let id = Uuid::new_v4().to_string();
        let path = storage_path(identity, category, &id, ENCRYPTED_EXTENSION);
        let record = FileMetadataRecord {
            id,
            user_id: identity.to_string(),
            file_type: category.to_string(),
            file_name: package.file_name,
            file_size: package.file_size,
            original_type: package.file_type,
            storage_path: path,
            encrypted: true,
            checksum: package.checksum,
            uploaded_at: Utc::now(),
        };

        self.store(slot, body, record).await
    }

    /// Store a validated file as-is. The blob key keeps the file's extension.
    pub async fn upload_file_unencrypted(
        &self,
        file: &FileObject,
        identity: &str,
        category: &str,
    ) -> VaultResult<UploadReceipt> {
        check_path_component(identity)?;
        check_path_component(category)?;
        let slot = self.reserve_slot(identity)?;
        let extension = self.validator.validate(Some(file))?;

        let id = Uuid::new_v4().to_string();
        let path = storage_path(identity, category, &id, &extension);
        let record = FileMetadataRecord {
            id,
            user_id: identity.to_string(),
            file_type: category.to_string(),
            file_name: agv_crypto::sanitize_file_name(&file.name),
            file_size: file.size(),
            original_type: file.content_type.clone(),
            storage_path: path,
            encrypted: false,
            checksum: checksum(&file.data),
            uploaded_at: Utc::now(),
        };

        self.store(slot, file.data.clone(), record).await
    }

    async fn store(
        &self,
        slot: Reservation<'_>,
        body: Vec<u8>,
        record: FileMetadataRecord,
    ) -> VaultResult<UploadReceipt> {
        let path = record.storage_path.clone();

        // Nothing to clean up if this fails; the slot is released on drop.
        self.blobs.put(&path, body).await.map_err(|e| {
            error!(path = %path, error = %e, "blob upload failed");
            VaultError::Storage(e)
        })?;
        slot.commit();

        if let Err(insert_err) = self.metadata.insert(record.clone()).await {
            match self.blobs.delete(&path).await {
                Ok(()) => warn!(
                    path = %path,
                    error = %insert_err,
                    "metadata insert failed, uploaded blob removed"
                ),
                Err(cleanup_err) => error!(
                    path = %path,
                    error = %insert_err,
                    cleanup_error = %cleanup_err,
                    "metadata insert failed and blob cleanup failed, blob is orphaned"
                ),
            }
            return Err(VaultError::Storage(insert_err));
        }

        info!(
            file_id = %record.id,
            user_id = %record.user_id,
            file_type = %record.file_type,
            size = record.file_size,
            encrypted = record.encrypted,
            "file uploaded"
        );

        Ok(UploadReceipt {
            file_id: record.id.clone(),
            storage_path: path,
            record,
        })
    }

    pub async fn file_record(&self, file_id: &str) -> VaultResult<FileMetadataRecord> {
        Ok(self.metadata.select(file_id).await?)
    }

    /// Fetch, decrypt and integrity-check a file.
    pub async fn download_file(
        &self,
        file_id: &str,
        passphrase: &SecretString,
    ) -> VaultResult<DownloadedFile> {
        let record = self.metadata.select(file_id).await?;
        let body = self.blobs.get(&record.storage_path).await?;

        let (file, actual) = if record.encrypted {
            let cipher = self.cipher.clone();
            let passphrase = SecretString::from(passphrase.expose_secret().to_owned());
            let decrypted = tokio::task::spawn_blocking(move || cipher.decrypt(&body, &passphrase))
                .await?
                .map_err(|e| {
                    warn!(file_id, error = %e, "decryption failed");
                    VaultError::from(e)
                })?;
            // The record name was sanitized at upload; the package header is unauthenticated.
            let name = if record.file_name.is_empty() {
                decrypted.file_name
            } else {
                record.file_name.clone()
            };
            let file = FileObject::new(name, decrypted.file_type, decrypted.data);
            (file, decrypted.checksum)
        } else {
            let actual = checksum(&body);
            let file = FileObject::new(record.file_name.clone(), record.original_type.clone(), body);
            (file, actual)
        };

        if record.checksum.is_empty() {
            warn!(file_id, "record has no checksum, skipping integrity check");
        } else if !checksums_match(&record.checksum, &actual) {
            error!(
                file_id,
                expected = %record.checksum,
                actual = %actual,
                "integrity check failed"
            );
            return Err(VaultError::Integrity {
                expected: record.checksum,
                actual,
            });
        }

        debug!(file_id, size = file.size(), "file downloaded");
        Ok(DownloadedFile {
            file,
            checksum: actual,
            record,
        })
    }

    /// Remove a file owned by `identity`: blob first, then the record.
    pub async fn delete_file(&self, file_id: &str, identity: &str) -> VaultResult<()> {
        let record = self.metadata.select(file_id).await?;
        if record.user_id != identity {
            warn!(file_id, identity, "delete refused: not the owner");
            return Err(VaultError::Unauthorized {
                file_id: file_id.to_string(),
            });
        }

        match self.blobs.delete(&record.storage_path).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(file_id, path = %record.storage_path, "blob already gone, removing record");
            }
            Err(e) => {
                error!(file_id, path = %record.storage_path, error = %e, "blob delete failed");
                return Err(e.into());
            }
        }

        self.metadata.delete(file_id).await?;
        info!(file_id, identity, "file deleted");
        Ok(())
    }

    /// Records owned by `identity`, newest first.
    pub async fn list_user_files(
        &self,
        identity: &str,
        category: Option<&str>,
    ) -> VaultResult<Vec<FileMetadataRecord>> {
        let mut records = self.metadata.list_by(identity, category).await?;
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(records)
    }

    /// Compare the stored checksum with the record without decrypting.
    pub async fn verify_file_integrity(&self, file_id: &str) -> VaultResult<IntegrityReport> {
        let record = self.metadata.select(file_id).await?;
        let body = self.blobs.get(&record.storage_path).await?;

        let stored_checksum = if record.encrypted {
            EncryptedPackage::from_bytes(&body)?.checksum
        } else {
            checksum(&body)
        };
        let matches = checksums_match(&record.checksum, &stored_checksum);
        if !matches {
            warn!(
                file_id,
                recorded = %record.checksum,
                stored = %stored_checksum,
                "integrity audit mismatch"
            );
        }

        Ok(IntegrityReport {
            file_id: record.id,
            storage_path: record.storage_path,
            recorded_checksum: record.checksum,
            stored_checksum,
            encrypted: record.encrypted,
            matches,
        })
    }

    /// Blob keys under `identity/` that no metadata record references.
    pub async fn find_orphaned_blobs(&self, identity: &str) -> VaultResult<Vec<String>> {
        check_path_component(identity)?;
        let referenced: std::collections::HashSet<String> = self
            .metadata
            .list_by(identity, None)
            .await?
            .into_iter()
            .map(|r| r.storage_path)
            .collect();

        let orphans: Vec<String> = self
            .blobs
            .list(identity)
            .await?
            .into_iter()
            .filter(|path| !referenced.contains(path))
            .collect();

        if !orphans.is_empty() {
            warn!(identity, count = orphans.len(), "orphaned blobs found");
        }
        Ok(orphans)
    }
}
