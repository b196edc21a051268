//! Key derivation: passphrase + 16-byte salt → 256-bit AES key
//!
//! PBKDF2-HMAC-SHA256 is the default so packages stay readable by the web
//! client; Argon2id is available for deployments that opt in. The chosen
//! algorithm and its cost are written into every package.

use std::num::NonZeroU32;

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::{KEY_SIZE, SALT_SIZE};

/// Floor for PBKDF2 iterations on newly written packages.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Upper bounds accepted when reading a package header.
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;
pub const MAX_ARGON2_MEM_KIB: u32 = 1024 * 1024;
pub const MAX_ARGON2_TIME_COST: u32 = 32;

/// A 256-bit key derived from a passphrase.
///
/// Zeroized on drop.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// KDF algorithm and cost, as recorded in a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum KdfParams {
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2Sha256 { iterations: u32 },
    #[serde(rename = "argon2id")]
    Argon2id {
        /// Memory cost in KiB
        mem_cost_kib: u32,
        time_cost: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams::Pbkdf2Sha256 {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Parameters assumed for packages written before the `kdf` field existed.
    pub fn legacy() -> Self {
        Self::default()
    }

    /// PBKDF2 with at least [`MIN_PBKDF2_ITERATIONS`].
    pub fn pbkdf2(iterations: u32) -> Self {
        if iterations < MIN_PBKDF2_ITERATIONS {
            tracing::warn!(
                requested = iterations,
                floor = MIN_PBKDF2_ITERATIONS,
                "PBKDF2 iteration count below floor, raising"
            );
        }
        KdfParams::Pbkdf2Sha256 {
            iterations: iterations.max(MIN_PBKDF2_ITERATIONS),
        }
    }

    pub fn argon2id(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        }
    }

    /// Reject cost parameters outside what this build is willing to run.
    pub fn check_bounds(&self) -> Result<(), CryptoError> {
        match *self {
            KdfParams::Pbkdf2Sha256 { iterations } => {
                if iterations == 0 || iterations > MAX_PBKDF2_ITERATIONS {
                    return Err(CryptoError::Kdf(format!(
                        "PBKDF2 iterations out of range: {iterations}"
                    )));
                }
            }
            KdfParams::Argon2id {
                mem_cost_kib,
                time_cost,
                ..
            } => {
                if mem_cost_kib > MAX_ARGON2_MEM_KIB || time_cost > MAX_ARGON2_TIME_COST {
                    return Err(CryptoError::Kdf(format!(
                        "Argon2id cost out of range: m={mem_cost_kib} t={time_cost}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Derive a 256-bit key from a passphrase and salt.
///
/// The salt must be freshly random for every package; it is stored in the
/// clear next to the ciphertext.
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> Result<DerivedKey, CryptoError> {
    params.check_bounds()?;
    let secret = passphrase.expose_secret().as_bytes();
    let mut key = [0u8; KEY_SIZE];

    match *params {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            let iterations = NonZeroU32::new(iterations)
                .ok_or_else(|| CryptoError::Kdf("PBKDF2 iterations must be non-zero".into()))?;
            ring::pbkdf2::derive(
                ring::pbkdf2::PBKDF2_HMAC_SHA256,
                iterations,
                salt,
                secret,
                &mut key,
            );
        }
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        } => {
            let argon2_params = Params::new(mem_cost_kib, time_cost, parallelism, Some(KEY_SIZE))
                .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(secret, salt, &mut key)
                .map_err(|e| CryptoError::Kdf(format!("Argon2id KDF failed: {e}")))?;
        }
    }

    Ok(DerivedKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    // Cheap parameters for unit tests only
    const FAST_PBKDF2: KdfParams = KdfParams::Pbkdf2Sha256 { iterations: 1_000 };
    const FAST_ARGON2: KdfParams = KdfParams::Argon2id {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("test-passphrase-123");
        let salt = [1u8; SALT_SIZE];

        for params in [FAST_PBKDF2, FAST_ARGON2] {
            let key1 = derive_key(&passphrase, &salt, &params).unwrap();
            let key2 = derive_key(&passphrase, &salt, &params).unwrap();
            assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
        }
    }

    #[test]
    fn test_kdf_different_passphrases() {
        let salt = [1u8; SALT_SIZE];
        let key1 = derive_key(&SecretString::from("passphrase-a"), &salt, &FAST_PBKDF2).unwrap();
        let key2 = derive_key(&SecretString::from("passphrase-b"), &salt, &FAST_PBKDF2).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");
        let key1 = derive_key(&passphrase, &[1u8; SALT_SIZE], &FAST_PBKDF2).unwrap();
        let key2 = derive_key(&passphrase, &[2u8; SALT_SIZE], &FAST_PBKDF2).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce unlinkable keys"
        );
    }

    #[test]
    fn test_algorithms_disagree() {
        let passphrase = SecretString::from("pw");
        let salt = [7u8; SALT_SIZE];
        let a = derive_key(&passphrase, &salt, &FAST_PBKDF2).unwrap();
        let b = derive_key(&passphrase, &salt, &FAST_ARGON2).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_pbkdf2_floor_enforced() {
        assert_eq!(
            KdfParams::pbkdf2(10),
            KdfParams::Pbkdf2Sha256 {
                iterations: MIN_PBKDF2_ITERATIONS
            }
        );
        assert_eq!(
            KdfParams::pbkdf2(250_000),
            KdfParams::Pbkdf2Sha256 { iterations: 250_000 }
        );
    }

    #[test]
    fn test_out_of_range_params_rejected() {
        let passphrase = SecretString::from("pw");
        let salt = [0u8; SALT_SIZE];
        let zero = KdfParams::Pbkdf2Sha256 { iterations: 0 };
        let huge = KdfParams::Argon2id {
            mem_cost_kib: MAX_ARGON2_MEM_KIB + 1,
            time_cost: 1,
            parallelism: 1,
        };
        assert!(matches!(
            derive_key(&passphrase, &salt, &zero),
            Err(CryptoError::Kdf(_))
        ));
        assert!(matches!(
            derive_key(&passphrase, &salt, &huge),
            Err(CryptoError::Kdf(_))
        ));
    }

    #[test]
    fn test_params_serialize_tagged() {
        let json = serde_json::to_string(&KdfParams::default()).unwrap();
        assert_eq!(json, r#"{"algorithm":"pbkdf2-sha256","iterations":100000}"#);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = DerivedKey::from_bytes([9u8; KEY_SIZE]);
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
