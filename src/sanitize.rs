//! Collection-name sanitization.
//!
//! Normalizes arbitrary document names into storage-safe collection
//! identifiers: length 3–63, alphanumeric/underscore/hyphen only, starting
//! and ending with an alphanumeric character. The mapping is total and
//! deterministic; when normalization destroys too much signal a SHA-1
//! fallback keeps the identifier collision-resistant.

use sha1::{Digest, Sha1};

/// Sanitize a document name into a valid collection identifier.
///
/// Never fails: every input string maps to exactly one valid identifier.
/// Collisions between distinct inputs are acceptable; only lexical validity
/// is guaranteed.
pub fn sanitize_collection_name(name: &str) -> String {
    // Replace every character outside [A-Za-z0-9_-] with '_'.
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse runs of separators, then strip them from both ends.
    let collapsed = collapse_runs(&collapse_runs(&replaced, '_'), '-');
    let stripped = collapsed.trim_matches(|c| c == '_' || c == '-' || c == '.');

    let candidate = if stripped.len() < 3 {
        format!("col_{}", &sha1_hex(name)[..8])
    } else {
        // All characters are ASCII at this point, so byte slicing is safe.
        stripped[..stripped.len().min(63)]
            .trim_end_matches(['_', '-'])
            .to_string()
    };

    let result = if is_valid(&candidate) {
        candidate
    } else {
        let head = &candidate[..candidate.len().min(54)];
        format!("col_{}_{}", head, &sha1_hex(name)[..4])
    };

    tracing::debug!(original = name, sanitized = %result, "sanitized collection name");
    result
}

/// Check the final identifier pattern: `^[A-Za-z0-9][\w-]{1,61}[A-Za-z0-9]$`.
fn is_valid(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }
    let first = bytes[0] as char;
    let last = bytes[bytes.len() - 1] as char;
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Collapse runs of 2+ occurrences of `sep` into a single occurrence.
fn collapse_runs(s: &str, sep: char) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = None;
    for c in s.chars() {
        if c == sep && prev == Some(sep) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn sha1_hex(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(name: &str) {
        let s = sanitize_collection_name(name);
        assert!(is_valid(&s), "invalid identifier {:?} for input {:?}", s, name);
    }

    #[test]
    fn test_plain_name_passes_through() {
        assert_eq!(sanitize_collection_name("report-2024"), "report-2024");
    }

    #[test]
    fn test_disallowed_chars_become_underscores() {
        assert_eq!(
            sanitize_collection_name("relatório final.pdf"),
            "relat_rio_final_pdf"
        );
    }

    #[test]
    fn test_runs_collapse() {
        assert_eq!(sanitize_collection_name("a___b---c"), "a_b-c");
    }

    #[test]
    fn test_empty_input_hash_fallback() {
        let s = sanitize_collection_name("");
        assert!(s.starts_with("col_"));
        assert_eq!(s.len(), 12);
        assert!(is_valid(&s));
    }

    #[test]
    fn test_symbols_only_hash_fallback() {
        let s = sanitize_collection_name("!!! ???");
        assert!(s.starts_with("col_"));
        assert!(is_valid(&s));
    }

    #[test]
    fn test_short_input_hash_fallback() {
        let s = sanitize_collection_name("ab");
        assert!(s.starts_with("col_"));
        assert!(is_valid(&s));
    }

    #[test]
    fn test_long_input_truncated_to_63() {
        let long = "x".repeat(200);
        let s = sanitize_collection_name(&long);
        assert_eq!(s.len(), 63);
        assert!(is_valid(&s));
    }

    #[test]
    fn test_deterministic() {
        let inputs = ["laudo pericial (v2).docx", "", "--__--", "über.txt"];
        for input in inputs {
            assert_eq!(
                sanitize_collection_name(input),
                sanitize_collection_name(input)
            );
        }
    }

    #[test]
    fn test_always_valid_for_adversarial_inputs() {
        let cases = [
            "",
            " ",
            ".",
            "..",
            "...",
            "a",
            "-a-",
            "___",
            "名前のないファイル",
            "mixed 日本語 and ascii.pdf",
            "!@#$%^&*()",
            &"-_".repeat(60),
            &"long name with spaces ".repeat(10),
        ];
        for case in cases {
            assert_valid(case);
        }
    }

    #[test]
    fn test_leading_trailing_separators_stripped() {
        assert_eq!(sanitize_collection_name("__case-file__"), "case-file");
    }
}
