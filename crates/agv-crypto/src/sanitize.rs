//! Filename sanitization
//!
//! Output alphabet is `[A-Za-z0-9._-]`, with no run of two or more dots and
//! at most 255 characters. The result is for display and metadata only;
//! storage keys are never built from it.

/// Longest sanitized name kept.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Replace disallowed characters with `_`, collapse repeated dots, truncate.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(MAX_FILE_NAME_LEN));
    let mut prev_dot = false;

    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '.' && prev_dot {
            continue;
        }
        prev_dot = c == '.';
        out.push(c);
    }

    // Output is ASCII, so byte truncation is on a char boundary.
    out.truncate(MAX_FILE_NAME_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_clean(s: &str) -> bool {
        s.len() <= MAX_FILE_NAME_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !s.contains("..")
    }

    #[test]
    fn keeps_ordinary_names() {
        assert_eq!(sanitize_file_name("bank-statement_2024.pdf"), "bank-statement_2024.pdf");
    }

    #[test]
    fn neutralises_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "._._etc_passwd");
        assert_eq!(sanitize_file_name("a....b"), "a.b");
    }

    #[test]
    fn replaces_spaces_and_unicode() {
        assert_eq!(sanitize_file_name("my scan é.png"), "my_scan__.png");
    }

    #[test]
    fn truncates_long_names() {
        let long = "a".repeat(400) + ".pdf";
        let out = sanitize_file_name(&long);
        assert_eq!(out.len(), MAX_FILE_NAME_LEN);
        assert!(out.chars().all(|c| c == 'a'));
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(sanitize_file_name(""), "");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(name in ".{0,400}") {
            let once = sanitize_file_name(&name);
            prop_assert_eq!(sanitize_file_name(&once), once.clone());
        }

        #[test]
        fn output_is_clean(name in ".{0,400}") {
            prop_assert!(is_clean(&sanitize_file_name(&name)));
        }

        #[test]
        fn dotted_names_are_clean(name in "[./a-z]{0,64}") {
            prop_assert!(is_clean(&sanitize_file_name(&name)));
        }
    }
}
