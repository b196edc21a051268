//! Encrypted package format
//!
//! A package is the JSON body stored in the blob store. Byte fields are
//! written as standard base64. Packages produced by the legacy web client
//! carried byte fields as arrays of numbers, named the ciphertext `data`,
//! and had no `checksum`, `version` or `kdf`; those still parse.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::kdf::KdfParams;

/// Current package format version
pub const PACKAGE_VERSION: u32 = 2;

fn legacy_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPackage {
    /// KDF salt (16 bytes)
    #[serde(with = "byte_field")]
    pub salt: Vec<u8>,
    /// AES-GCM nonce (12 bytes)
    #[serde(with = "byte_field")]
    pub iv: Vec<u8>,
    /// Ciphertext with the GCM tag appended
    #[serde(with = "byte_field", alias = "data")]
    pub ciphertext: Vec<u8>,
    /// Sanitized original filename
    pub file_name: String,
    /// Declared MIME type
    pub file_type: String,
    /// Plaintext size in bytes
    pub file_size: u64,
    /// SHA-256 of the plaintext (hex); empty for legacy packages
    #[serde(default)]
    pub checksum: String,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default = "KdfParams::legacy")]
    pub kdf: KdfParams,
}

impl EncryptedPackage {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        serde_json::to_vec(self)
            .map_err(|e| CryptoError::MalformedPackage(format!("package serialization: {e}")))
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        serde_json::from_slice(data)
            .map_err(|e| CryptoError::MalformedPackage(format!("package deserialization: {e}")))
    }
}

/// Input accepted by decryption: a parsed package or its serialized JSON.
///
/// Resolved once at the boundary; the engine only ever sees a parsed package.
#[derive(Debug, Clone)]
pub enum PackageSource<'a> {
    Json(&'a [u8]),
    Parsed(&'a EncryptedPackage),
}

impl<'a> PackageSource<'a> {
    pub fn resolve(self) -> Result<Cow<'a, EncryptedPackage>, CryptoError> {
        match self {
            PackageSource::Json(bytes) => EncryptedPackage::from_bytes(bytes).map(Cow::Owned),
            PackageSource::Parsed(package) => Ok(Cow::Borrowed(package)),
        }
    }
}

impl<'a> From<&'a EncryptedPackage> for PackageSource<'a> {
    fn from(package: &'a EncryptedPackage) -> Self {
        PackageSource::Parsed(package)
    }
}

impl<'a> From<&'a [u8]> for PackageSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        PackageSource::Json(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for PackageSource<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        PackageSource::Json(bytes.as_slice())
    }
}

impl<'a> From<&'a str> for PackageSource<'a> {
    fn from(json: &'a str) -> Self {
        PackageSource::Json(json.as_bytes())
    }
}

/// Base64 on write; base64 string or array of byte values on read.
mod byte_field {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Encoded(String),
        Raw(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Encoded(s) => STANDARD
                .decode(s.as_bytes())
                .map_err(|e| serde::de::Error::custom(format!("base64 decode: {e}"))),
            Repr::Raw(bytes) => Ok(bytes),
        }
    }
}
