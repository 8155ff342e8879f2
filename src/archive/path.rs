//! Entry name sanitization and classification

/// Archive manifest
pub const MANIFEST_ENTRY: &str = "manifest.json";
/// Mineral records, plaintext JSON or ciphertext
pub const RECORDS_ENTRY: &str = "minerals.json";
/// Reference mineral dataset
pub const REFERENCE_ENTRY: &str = "reference_minerals.csv";
/// Media written by current exports
pub const MEDIA_PREFIX: &str = "photos/";
/// Media prefix used by older exports
pub const LEGACY_MEDIA_PREFIX: &str = "media/";

/// What an entry holds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Manifest,
    Records,
    ReferenceCsv,
    /// Media file, relative to the media directory
    Media(String),
}

/// Normalize an entry name, or `None` if it could escape the extraction root
///
/// Backslashes become `/`. Absolute names, anything with `:`, `..`, and
/// empty or `.` segments are refused.
pub fn sanitize_entry_path(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') || normalized.contains(':') || normalized.contains("..") {
        return None;
    }
    if normalized
        .split('/')
        .any(|segment| segment.is_empty() || segment == ".")
    {
        return None;
    }
    Some(normalized)
}

/// Classify a sanitized path; unknown entries yield `None`
pub fn classify(path: &str) -> Option<EntryKind> {
    match path {
        MANIFEST_ENTRY => Some(EntryKind::Manifest),
        RECORDS_ENTRY => Some(EntryKind::Records),
        REFERENCE_ENTRY => Some(EntryKind::ReferenceCsv),
        _ => path
            .strip_prefix(MEDIA_PREFIX)
            .or_else(|| path.strip_prefix(LEGACY_MEDIA_PREFIX))
            .filter(|rest| !rest.is_empty())
            .map(|rest| EntryKind::Media(rest.to_string())),
    }
}

/// Archive path for a media file name
pub fn media_entry_path(file_name: &str) -> String {
    format!("{}{}", MEDIA_PREFIX, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass() {
        assert_eq!(sanitize_entry_path("manifest.json").as_deref(), Some("manifest.json"));
        assert_eq!(
            sanitize_entry_path("photos/a/b.jpg").as_deref(),
            Some("photos/a/b.jpg")
        );
    }

    #[test]
    fn test_backslashes_normalized() {
        assert_eq!(
            sanitize_entry_path("photos\\quartz.jpg").as_deref(),
            Some("photos/quartz.jpg")
        );
    }

    #[test]
    fn test_traversal_rejected() {
        for name in [
            "../etc/passwd",
            "photos/../../x",
            "..\\windows\\system32",
            "/etc/passwd",
            "C:\\boot.ini",
            "file:///etc/passwd",
            "photos//x.jpg",
            "photos/./x.jpg",
            "photos/",
            "",
        ] {
            assert_eq!(sanitize_entry_path(name), None, "{name} should be rejected");
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("manifest.json"), Some(EntryKind::Manifest));
        assert_eq!(classify("minerals.json"), Some(EntryKind::Records));
        assert_eq!(classify("reference_minerals.csv"), Some(EntryKind::ReferenceCsv));
        assert_eq!(
            classify("photos/q.jpg"),
            Some(EntryKind::Media("q.jpg".into()))
        );
        assert_eq!(
            classify("media/legacy.png"),
            Some(EntryKind::Media("legacy.png".into()))
        );
        assert_eq!(classify("readme.txt"), None);
        assert_eq!(classify("nested/minerals.json"), None);
    }
}
