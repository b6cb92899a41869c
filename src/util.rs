//! File-name helpers.

use std::path::Path;

/// Name used when a title sanitizes to nothing.
const FALLBACK_FILE_NAME: &str = "book";

/// File stem of `path` as a string (lossy), or empty.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// True if `path` has a `.txt` extension (any case).
pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// Make `name` safe to use as a single path component on common filesystems.
///
/// Separators, reserved punctuation and control characters become `_`;
/// leading and trailing dots and spaces are removed.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
