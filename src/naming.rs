//! Identifier generation and file name handling.

/// Extensions accepted for uploaded files.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "json"];

/// Extension used for a derived artifact when the parent's blob cannot be found.
pub const DEFAULT_EXTENSION: &str = "json";

/// Source of the identifiers that name records and their blobs.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs in hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext)
}

/// Reduce a client-supplied file name to a safe, flat name.
///
/// Only the final path component survives. Non-ASCII characters are dropped,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed and
/// leading/trailing dots and underscores are trimmed. May return an empty string.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let ascii: String = last.chars().filter(char::is_ascii).collect();

    ascii
        .split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// Lowercased text after the last `.`, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Split a name into stem and extension (extension keeps its dot).
/// Leading dots belong to the stem, so `.env` has no extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if file_name[..idx].chars().any(|c| c != '.') => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

/// Insert `_{suffix}` between a file name's stem and extension.
///
/// When the name carries no extension, `ext_hint` supplies one.
pub fn add_suffix_before_ext(file_name: &str, suffix: &str, ext_hint: Option<&str>) -> String {
    let (stem, ext) = split_extension(file_name);
    let ext = match (ext.is_empty(), ext_hint) {
        (true, Some(hint)) if !hint.trim_start_matches('.').is_empty() => {
            format!(".{}", hint.trim_start_matches('.'))
        }
        _ => ext.to_string(),
    };
    let suffix = suffix.trim_matches('_');

    if stem.is_empty() {
        format!("{suffix}{ext}")
    } else {
        format!("{stem}_{suffix}{ext}")
    }
}
