pub mod config;
pub mod error;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use types::{FileMetadataRecord, FileObject};
