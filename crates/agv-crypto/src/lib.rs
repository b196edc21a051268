//! agv-crypto: client-side encryption for sensitive document uploads
//!
//! Pipeline: validate (caller) → SHA-256 plaintext → derive key → AES-256-GCM → JSON package → upload
//!
//! Package layout:
//! ```text
//! EncryptedPackage (JSON)
//!   ├── salt        16 random bytes, fresh per package (KDF input)
//!   ├── iv          12 random bytes, fresh per package (GCM nonce)
//!   ├── ciphertext  AES-256-GCM output including the 16-byte tag
//!   ├── kdf         algorithm + cost parameters used to derive the key
//!   └── fileName / fileType / fileSize / checksum / timestamp / version
//! ```
//!
//! Only `ciphertext` needs the passphrase; the checksum is over plaintext so
//! integrity can be audited without it.

pub mod checksum;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod package;
pub mod random;
pub mod sanitize;

pub use checksum::{checksum, checksum_reader, checksums_match};
pub use engine::{DecryptedFile, PackageCipher};
pub use error::CryptoError;
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use package::{EncryptedPackage, PackageSource, PACKAGE_VERSION};
pub use random::{OsRandom, RandomSource};
pub use sanitize::sanitize_file_name;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-package KDF salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
