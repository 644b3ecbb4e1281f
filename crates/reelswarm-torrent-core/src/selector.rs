//! Playable file selection.

use std::path::Path;

use crate::model::EngineFile;

/// Extensions treated as directly playable, compared case-insensitively.
pub const PLAYABLE_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"];

/// Choose the file to stream.
///
/// Returns the first file, in the given order, whose extension is playable.
/// Otherwise returns the largest file, keeping the earliest one on ties.
/// Returns `None` only for an empty list.
#[must_use]
pub fn select_media_file(files: &[EngineFile]) -> Option<&EngineFile> {
    files
        .iter()
        .find(|file| is_playable(&file.name))
        .or_else(|| {
            files.iter().fold(None, |largest: Option<&EngineFile>, file| match largest {
                Some(current) if current.length >= file.length => Some(current),
                _ => Some(file),
            })
        })
}

fn is_playable(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PLAYABLE_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

/// MIME type for a file name, falling back to `application/octet-stream`.
#[must_use]
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
