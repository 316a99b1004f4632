//! Host filesystem helpers for the storage roots.

use std::fs;
use std::path::Path;

/// Reduce an operator-supplied filename to a single safe path component.
///
/// Path separators and traversal sequences are stripped, anything outside
/// alphanumerics, `.`, `-` and `_` is replaced, and leading dots are removed
/// so the result can never escape or hide inside a storage root.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Timestamp component used in backup, recording and screenshot names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string()
}

/// Count the entries in a directory. Used to report how many items a photo
/// pull actually produced, since the transfer tool's own count is not
/// reliable. Missing/unreadable directories count as zero.
pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
