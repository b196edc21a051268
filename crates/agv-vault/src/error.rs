use std::time::Duration;

use agv_core::StoreError;
use agv_crypto::CryptoError;
use thiserror::Error;

use crate::validate::ValidationError;

/// Everything a vault operation can fail with.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload rate limit exceeded. Try again in {} seconds.", .retry_after.as_millis().div_ceil(1000).max(1))]
    RateLimited { retry_after: Duration },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: wrong password?")]
    Decryption,

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("integrity check failed: expected checksum {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("not authorized to modify file {file_id}")]
    Unauthorized { file_id: String },

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::EncryptionFailure(msg) | CryptoError::Kdf(msg) => Self::Encryption(msg),
            CryptoError::DecryptionFailure => Self::Decryption,
            CryptoError::MalformedPackage(msg) => Self::MalformedPackage(msg),
        }
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl VaultError {
    /// True when the named record or blob does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StoreError::NotFound(_)))
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
