//! Whole-file AES-256-GCM encryption into [`EncryptedPackage`]s
//!
//! Every `encrypt` draws a fresh salt and nonce, so encrypting the same bytes
//! twice yields unrelated packages. `decrypt` is deterministic given the
//! package and passphrase.

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use agv_core::types::FileObject;
use secrecy::SecretString;
use tracing::debug;

use crate::checksum::checksum;
use crate::error::CryptoError;
use crate::kdf::{derive_key, KdfParams};
use crate::package::{EncryptedPackage, PackageSource, PACKAGE_VERSION};
use crate::random::{OsRandom, RandomSource};
use crate::sanitize::sanitize_file_name;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Plaintext recovered from a package, with the package's descriptive fields.
#[derive(Debug, Clone)]
pub struct DecryptedFile {
    pub data: Vec<u8>,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    /// SHA-256 recomputed over the decrypted bytes
    pub checksum: String,
    /// Checksum recorded in the package at encryption time (empty if legacy)
    pub package_checksum: String,
    pub timestamp: u64,
}

/// Encrypts and decrypts packages with a fixed KDF policy for new packages.
#[derive(Clone)]
pub struct PackageCipher {
    kdf: KdfParams,
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for PackageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCipher")
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

impl Default for PackageCipher {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl PackageCipher {
    pub fn new(kdf: KdfParams) -> Self {
        Self::with_random(kdf, Arc::new(OsRandom))
    }

    /// Use a specific randomness source for salts and nonces.
    pub fn with_random(kdf: KdfParams, rng: Arc<dyn RandomSource>) -> Self {
        Self { kdf, rng }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    /// Encrypt a whole file under a passphrase.
    ///
    /// The checksum is taken over the plaintext before encryption.
    pub fn encrypt(
        &self,
        file: &FileObject,
        passphrase: &SecretString,
    ) -> Result<EncryptedPackage, CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        self.rng.fill(&mut salt);
        self.rng.fill(&mut iv);

        let plain_checksum = checksum(&file.data);

        let key = derive_key(passphrase, &salt, &self.kdf)
            .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))?;
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), file.data.as_slice())
            .map_err(|e| CryptoError::EncryptionFailure(format!("AES-256-GCM: {e}")))?;

        debug!(
            size = file.data.len(),
            ciphertext = ciphertext.len(),
            "encrypted package"
        );

        Ok(EncryptedPackage {
            salt: salt.to_vec(),
            iv: iv.to_vec(),
            ciphertext,
            file_name: sanitize_file_name(&file.name),
            file_type: file.content_type.clone(),
            file_size: file.data.len() as u64,
            checksum: plain_checksum,
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            version: PACKAGE_VERSION,
            kdf: self.kdf,
        })
    }

    /// Decrypt a package (parsed or serialized) with a passphrase.
    ///
    /// A wrong passphrase and a tampered ciphertext both surface as
    /// [`CryptoError::DecryptionFailure`]. The header is not authenticated,
    /// so the returned `file_name` is re-sanitized.
    pub fn decrypt<'a>(
        &self,
        source: impl Into<PackageSource<'a>>,
        passphrase: &SecretString,
    ) -> Result<DecryptedFile, CryptoError> {
        let package = source.into().resolve()?;

        let salt: [u8; SALT_SIZE] = package.salt.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedPackage(format!(
                "salt is {} bytes (expected {SALT_SIZE})",
                package.salt.len()
            ))
        })?;
        if package.iv.len() != IV_SIZE {
            return Err(CryptoError::MalformedPackage(format!(
                "iv is {} bytes (expected {IV_SIZE})",
                package.iv.len()
            )));
        }
        if package.ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::MalformedPackage(format!(
                "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
                package.ciphertext.len()
            )));
        }

        let key = derive_key(passphrase, &salt, &package.kdf)
            .map_err(|e| CryptoError::MalformedPackage(e.to_string()))?;
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let data = cipher
            .decrypt(Nonce::from_slice(&package.iv), package.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailure)?;

        if data.len() as u64 != package.file_size {
            debug!(
                recorded = package.file_size,
                actual = data.len(),
                "package fileSize disagrees with plaintext length"
            );
        }

        Ok(DecryptedFile {
            checksum: checksum(&data),
            package_checksum: package.checksum.clone(),
            file_name: sanitize_file_name(&package.file_name),
            file_type: package.file_type.clone(),
            file_size: data.len() as u64,
            timestamp: package.timestamp,
            data,
        })
    }
}
