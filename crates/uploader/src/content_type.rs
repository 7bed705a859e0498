//! Content-type inference for uploaded files.

use std::path::Path;

/// Fallback when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Detects a video content type from a file extension.
pub fn detect_content_type(path: &str) -> Option<&'static str> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("mp4" | "m4v") => Some("video/mp4"),
        Some("mov") => Some("video/quicktime"),
        Some("webm") => Some("video/webm"),
        Some("mkv") => Some("video/x-matroska"),
        Some("avi") => Some("video/x-msvideo"),
        _ => None,
    }
}

/// Content type to declare for `path`, defaulting to octet-stream.
pub fn content_type_for(path: &str) -> &'static str {
    detect_content_type(path).unwrap_or(DEFAULT_CONTENT_TYPE)
}
