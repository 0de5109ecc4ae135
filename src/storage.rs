//! Storage helpers for crawl artifacts on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Longest file stem we produce, in characters.
const MAX_STEM_CHARS: usize = 100;

/// Image extensions a previous run may have written.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "webp", "svg"];

/// Sanitize a display name for use as a file stem.
///
/// Path-hostile characters, control characters and whitespace become `_`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '_' || c == '.' || c == ' ');
    if trimmed.is_empty() {
        "profile".to_string()
    } else {
        trimmed.chars().take(MAX_STEM_CHARS).collect()
    }
}

/// File stem of a profile image for the record stored as `{record_stem}.json`.
/// The extension is chosen at write time.
pub fn image_stem(record_stem: &str) -> String {
    format!("{}_profile", sanitize_filename(record_stem))
}

/// Find an already-written image for a stem.
pub fn existing_image(images_dir: &Path, stem: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

/// Map an image MIME type to a file extension.
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// Pick an extension from the declared content type, else sniff the bytes.
pub fn image_extension(content_type: &str, data: &[u8]) -> &'static str {
    if let Some(ext) = mime_to_extension(content_type) {
        return ext;
    }
    infer::get(data)
        .and_then(|kind| mime_to_extension(kind.mime_type()))
        .unwrap_or("jpg")
}

/// Write bytes so readers never observe a half-written file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Serialize as pretty JSON (UTF-8, non-ASCII kept verbatim) and write atomically.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_atomic(path, &json)
}

/// Relative path for web consumers, always with forward slashes.
pub fn relative_web_path(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}
