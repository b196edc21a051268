//! agv-vault: encrypted document storage for a single deployment
//!
//! Upload path: rate limit → validate → encrypt → blob put → metadata insert.
//! Download path: metadata select → blob get → decrypt → checksum compare.
//!
//! Blob and metadata backends are supplied by the caller through the
//! [`agv_storage::BlobStore`] and [`agv_storage::MetadataStore`] traits.

pub mod error;
pub mod rate_limit;
pub mod service;
pub mod validate;

pub use error::{VaultError, VaultResult};
pub use rate_limit::{
    Clock, ManualClock, MonotonicClock, RateLimitConfig, RateLimitDecision, RateLimiter,
    Reservation,
};
pub use service::{DownloadedFile, IntegrityReport, UploadReceipt, Vault, VaultOptions};
pub use validate::{FileValidator, ValidationError};
