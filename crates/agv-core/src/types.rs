use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row stored in the metadata table for every blob in the document bucket.
///
/// Exactly one record references each blob at `storage_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    /// Random UUID, generated by the vault at upload time
    pub id: String,
    /// Owning identity
    pub user_id: String,
    /// Logical category, e.g. "kyc" or "bank_statement"
    pub file_type: String,
    /// Sanitized original filename (display only)
    pub file_name: String,
    /// Plaintext size in bytes
    pub file_size: u64,
    /// Declared MIME type of the original file
    pub original_type: String,
    /// Blob key: `{user_id}/{file_type}/{id}.encrypted` (or `.{ext}` when plain)
    pub storage_path: String,
    /// Whether the blob body is an encrypted package
    pub encrypted: bool,
    /// SHA-256 of the plaintext, lowercase hex; empty on rows that predate checksums
    #[serde(default)]
    pub checksum: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileMetadataRecord {
    /// True if this record belongs to `identity` and, when given, `category`.
    pub fn matches(&self, identity: &str, category: Option<&str>) -> bool {
        self.user_id == identity && category.is_none_or(|c| self.file_type == c)
    }
}

/// A file as presented by the caller: declared name and MIME type plus content.
///
/// `name` and `content_type` are caller-controlled metadata and are not trusted.
#[derive(Clone, PartialEq, Eq)]
pub struct FileObject {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileObject {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lower-cased text after the last `.` of the name; the whole name if it has no dot.
    pub fn extension(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

impl std::fmt::Debug for FileObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObject")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Build the blob key for a file. Both components come from trusted caller
/// context; the user-supplied filename never participates.
pub fn storage_path(user_id: &str, file_type: &str, id: &str, extension: &str) -> String {
    format!("{user_id}/{file_type}/{id}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, category: &str) -> FileMetadataRecord {
        FileMetadataRecord {
            id: "f1".into(),
            user_id: user.into(),
            file_type: category.into(),
            file_name: "doc.pdf".into(),
            file_size: 4,
            original_type: "application/pdf".into(),
            storage_path: storage_path(user, category, "f1", "encrypted"),
            encrypted: true,
            checksum: String::new(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn extension_is_last_segment_lowercased() {
        let f = |name: &str| FileObject::new(name, "application/pdf", vec![]).extension();
        assert_eq!(f("Scan.Final.PDF"), "pdf");
        assert_eq!(f("photo.jpeg"), "jpeg");
        assert_eq!(f("noext"), "noext");
        assert_eq!(f("trailing."), "");
    }

    #[test]
    fn debug_omits_content() {
        let file = FileObject::new("a.pdf", "application/pdf", b"secret".to_vec());
        let shown = format!("{file:?}");
        assert!(shown.contains("size: 6"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn storage_path_layout() {
        assert_eq!(
            storage_path("user-a", "kyc", "1234", "encrypted"),
            "user-a/kyc/1234.encrypted"
        );
    }

    #[test]
    fn matches_filters_by_owner_and_category() {
        let r = record("user-a", "kyc");
        assert!(r.matches("user-a", None));
        assert!(r.matches("user-a", Some("kyc")));
        assert!(!r.matches("user-a", Some("bank_statement")));
        assert!(!r.matches("user-b", None));
    }

    #[test]
    fn record_serializes_column_names() {
        let text = to_toml(&record("u", "kyc"));
        for field in [
            "id",
            "user_id",
            "file_type",
            "file_name",
            "file_size",
            "original_type",
            "storage_path",
            "encrypted",
            "checksum",
            "uploaded_at",
        ] {
            assert!(text.contains(&format!("{field} =")), "missing {field}");
        }
    }

    fn to_toml(r: &FileMetadataRecord) -> String {
        toml::to_string(r).unwrap()
    }
}
