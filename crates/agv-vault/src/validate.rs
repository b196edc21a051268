//! Upload validation: presence, size, declared type, extension, magic bytes
//!
//! Checks run in that order and stop at the first failure. MIME type and
//! extension are caller-controlled; the signature check is the only one that
//! looks at content, so it runs last and is never skipped.

use agv_core::FileObject;
use thiserror::Error;

/// Default upload ceiling: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/jpg", "image/png"];

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Number of leading bytes inspected for a signature.
pub const SIGNATURE_PROBE_LEN: usize = 8;

const SIGNATURES: &[(&str, &[u8])] = &[
    ("pdf", &[0x25, 0x50, 0x44, 0x46]),
    ("jpg", &[0xFF, 0xD8, 0xFF]),
    ("jpeg", &[0xFF, 0xD8, 0xFF]),
    ("png", &[0x89, 0x50, 0x4E, 0x47]),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("File size {size} exceeds the {} limit", limit_label(.max))]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid file type '{0}'. Only PDF, JPG, and PNG are allowed.")]
    UnsupportedType(String),

    #[error("Invalid file extension '{0}'")]
    UnsupportedExtension(String),

    #[error("File content does not match the .{extension} format")]
    ContentMismatch { extension: String },

    /// Identity or category unusable as a storage key segment.
    #[error("invalid storage path component '{0}'")]
    InvalidPathComponent(String),
}

fn limit_label(max: &u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if *max >= MIB && max % MIB == 0 {
        format!("{} MiB", max / MIB)
    } else {
        format!("{max} byte")
    }
}

/// Expected leading bytes for an allowed extension.
pub fn expected_signature(extension: &str) -> Option<&'static [u8]> {
    SIGNATURES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, sig)| *sig)
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    max_size: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl FileValidator {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Validate a candidate upload. Returns the normalised extension on success.
    ///
    /// A file with neither a name nor content counts as no file at all.
    pub fn validate(&self, file: Option<&FileObject>) -> Result<String, ValidationError> {
        let file = match file {
            Some(f) if !(f.name.is_empty() && f.data.is_empty()) => f,
            _ => return Err(ValidationError::NoFileSelected),
        };

        if file.size() > self.max_size {
            return Err(ValidationError::FileTooLarge {
                size: file.size(),
                max: self.max_size,
            });
        }

        if !ALLOWED_MIME_TYPES.contains(&file.content_type.as_str()) {
            return Err(ValidationError::UnsupportedType(file.content_type.clone()));
        }

        let extension = file.extension();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::UnsupportedExtension(extension));
        }

        let head = &file.data[..file.data.len().min(SIGNATURE_PROBE_LEN)];
        let signature_ok = expected_signature(&extension).is_some_and(|sig| head.starts_with(sig));
        if !signature_ok {
            return Err(ValidationError::ContentMismatch { extension });
        }

        Ok(extension)
    }
}

/// Reject storage key segments that could escape their prefix.
pub fn check_path_component(value: &str) -> Result<(), ValidationError> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control);
    if bad {
        return Err(ValidationError::InvalidPathComponent(value.to_string()));
    }
    Ok(())
}
