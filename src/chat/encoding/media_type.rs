//! Media type inference from file extensions.

use std::path::Path;

/// Fallback when the extension is unknown or missing.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Extensions accepted by the upload picker plus common text formats.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
];

/// Infer the media type of a file from its extension (case-insensitive).
#[must_use]
pub fn media_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MEDIA_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(known, _)| *known == ext.as_str())
        .map_or(DEFAULT_MEDIA_TYPE, |&(_, media_type)| media_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(media_type_for(Path::new("report.pdf")), "application/pdf");
        assert_eq!(media_type_for(Path::new("notes.TXT")), "text/plain");
        assert_eq!(media_type_for(Path::new("dir/photo.JPeG")), "image/jpeg");
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(media_type_for(Path::new("archive.xyz")), DEFAULT_MEDIA_TYPE);
        assert_eq!(media_type_for(Path::new("Makefile")), DEFAULT_MEDIA_TYPE);
    }
}
