use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level vault configuration (loaded from agv.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub crypto: CryptoConfig,
    pub limits: LimitsConfig,
    pub log: LogConfig,
}

impl VaultConfig {
    /// Read and parse a TOML config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found (using defaults)");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Fs,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which blob backend to build
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend
    pub root: PathBuf,
    /// S3-compatible endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket holding the encrypted documents
    pub bucket: String,
    /// Refuse plaintext HTTP endpoints
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSON file backing the metadata table
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    Pbkdf2,
    Argon2id,
}

/// Passphrase key-derivation settings for new packages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub kdf: KdfKind,
    /// PBKDF2-HMAC-SHA256 iterations (default and minimum: 100000)
    pub pbkdf2_iterations: u32,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted upload in bytes (default: 10 MiB)
    pub max_file_size: u64,
    /// Uploads allowed per identity within the window
    pub rate_limit_max: usize,
    /// Sliding window length in milliseconds
    pub rate_limit_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/agv/blobs"),
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "documents".into(),
            enforce_tls: false,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/agv/file_metadata.json"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: KdfKind::Pbkdf2,
            pbkdf2_iterations: 100_000,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            rate_limit_max: 5,
            rate_limit_window_ms: 60_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
backend = "s3"
endpoint = "https://s3.example.com"
region = "eu-west-1"
bucket = "kyc-docs"
enforce_tls = true

[metadata]
path = "/var/lib/agv/meta.json"

[crypto]
kdf = "argon2id"
argon2_mem_cost_kib = 131072
argon2_time_cost = 4

[limits]
max_file_size = 5242880
rate_limit_max = 3
rate_limit_window_ms = 30000

[log]
level = "debug"
format = "json"
"#;
        let config: VaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket, "kyc-docs");
        assert!(config.storage.enforce_tls);
        assert_eq!(config.metadata.path, PathBuf::from("/var/lib/agv/meta.json"));
        assert_eq!(config.crypto.kdf, KdfKind::Argon2id);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.argon2_parallelism, 4);
        assert_eq!(config.limits.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.limits.rate_limit_max, 3);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: VaultConfig = toml::from_str("").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.bucket, "documents");
        assert_eq!(config.crypto.kdf, KdfKind::Pbkdf2);
        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
        assert_eq!(config.limits.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.limits.rate_limit_max, 5);
        assert_eq!(config.limits.rate_limit_window_ms, 60_000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = VaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: VaultConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.crypto.kdf, parsed.crypto.kdf);
        assert_eq!(config.limits.rate_limit_max, parsed.limits.rate_limit_max);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = VaultConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.bucket, "documents");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("agv.toml");
        std::fs::write(&path, "[storage\nbackend = ").unwrap();
        assert!(VaultConfig::load(&path).is_err());
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }
}
