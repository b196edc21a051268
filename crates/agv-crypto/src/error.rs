use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    /// AEAD tag mismatch. Covers both a wrong passphrase and tampered
    /// ciphertext; the two are indistinguishable and must stay that way.
    #[error("decryption failed: wrong password?")]
    DecryptionFailure,

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),
}
