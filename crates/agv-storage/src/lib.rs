//! agv-storage: the two collaborators the vault talks to
//!
//! - [`BlobStore`]: opaque bytes keyed by path (OpenDAL in production)
//! - [`MetadataStore`]: one [`FileMetadataRecord`](agv_core::FileMetadataRecord) per blob

pub mod blob;
pub mod health;
pub mod json_store;
pub mod metadata;
pub mod operator;

pub use blob::BlobStore;
pub use health::{check_health, StorageHealth};
pub use json_store::JsonMetadataStore;
pub use metadata::{MemoryMetadataStore, MetadataStore};
pub use operator::{build_from_core_config, build_operator, memory_operator, StorageConfig};
