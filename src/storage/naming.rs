//! Stored filename generation.
//!
//! Stored names never reuse the client's filename: they are
//! `{field}-{micros}-{random}.{ext}`, so two uploads of `report.pdf` land
//! in two distinct files.

use chrono::Utc;
use rand::Rng;

/// Field name used when the client's field name has no usable characters.
const FALLBACK_FIELD_NAME: &str = "file";

/// Upper bound (exclusive) of the random component.
const RANDOM_BOUND: u32 = 1_000_000_000;

/// Generate a stored filename for an upload.
///
/// `extension` is expected to be already normalized and allow-listed; an
/// empty extension produces a name without a trailing dot.
pub fn generate(field_name: &str, extension: &str) -> String {
    let field = sanitize_field_name(field_name);
    let token = uniqueness_token();

    if extension.is_empty() {
        format!("{field}-{token}")
    } else {
        format!("{field}-{token}.{extension}")
    }
}

/// Microsecond timestamp plus a random number below one billion.
fn uniqueness_token() -> String {
    let micros = Utc::now().timestamp_micros();
    let random = rand::rng().random_range(0..RANDOM_BOUND);
    format!("{micros}-{random}")
}

/// Keep only ASCII alphanumerics, `-` and `_` from the field name.
fn sanitize_field_name(field_name: &str) -> String {
    let sanitized: String = field_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();

    if sanitized.is_empty() {
        FALLBACK_FIELD_NAME.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_format() {
        let name = generate("file", "png");

        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".png"));

        let token = name
            .strip_prefix("file-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .unwrap();
        let (micros, random) = token.split_once('-').unwrap();
        assert!(micros.parse::<i64>().unwrap() > 0);
        assert!(random.parse::<u32>().unwrap() < RANDOM_BOUND);
    }

    #[test]
    fn test_generate_without_extension() {
        let name = generate("file", "");
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_generate_never_uses_original_name() {
        let name = generate("file", "pdf");
        assert!(!name.contains("report"));
        assert_ne!(name, "report.pdf");
    }

    #[test]
    fn test_generate_is_unique_in_tight_loop() {
        let names: HashSet<String> = (0..1000).map(|_| generate("file", "txt")).collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn test_sanitize_field_name() {
        assert_eq!(sanitize_field_name("file"), "file");
        assert_eq!(sanitize_field_name("my_upload-1"), "my_upload-1");
        assert_eq!(sanitize_field_name("../evil"), "evil");
        assert_eq!(sanitize_field_name("a/b\\c"), "abc");
        assert_eq!(sanitize_field_name(""), "file");
        assert_eq!(sanitize_field_name("日本"), "file");
        assert_eq!(sanitize_field_name(&"x".repeat(200)).len(), 64);
    }
}
