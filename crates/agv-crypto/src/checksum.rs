//! SHA-256 content checksums over plaintext
//!
//! The checksum is recorded at upload time (in the package and the metadata
//! row) and recomputed after every download.

use sha2::{Digest, Sha256};
use std::io::Read;

/// SHA-256 of `data` as 64 lowercase hex chars.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Streaming variant for inputs that should not be buffered whole.
pub fn checksum_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare two hex checksums, ignoring case.
pub fn checksums_match(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_input_has_digest() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn covers_whole_content() {
        let mut data = vec![0u8; 200_000];
        let before = checksum(&data);
        *data.last_mut().unwrap() = 1;
        assert_ne!(before, checksum(&data), "trailing byte change must be detected");
    }

    #[test]
    fn empty_checksum_never_matches() {
        assert!(!checksums_match("", ""));
        assert!(checksums_match("ABCD", "abcd"));
    }

    proptest! {
        #[test]
        fn reader_agrees_with_slice(data in proptest::collection::vec(any::<u8>(), 0..=200_000)) {
            let streamed = checksum_reader(std::io::Cursor::new(&data)).unwrap();
            prop_assert_eq!(streamed, checksum(&data));
        }

        #[test]
        fn checksum_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            prop_assert_eq!(checksum(&data), checksum(&data));
        }
    }
}
