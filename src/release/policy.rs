//! Per-file delivery policy.
//!
//! Maps a bucket key to the `Content-Type` and `Cache-Control` headers it is
//! uploaded with. Keys are expected in the `{branch}/{version|latest}/...`
//! layout.

use std::path::Path;

use super::traits::FileArtifact;
use crate::storage::{Access, UploadPayload};

/// Max-age for objects under the movable `latest` alias (3 hours).
pub const LATEST_MAX_AGE: u32 = 10_800;

/// Max-age for objects under a pinned version (1 year).
pub const VERSIONED_MAX_AGE: u32 = 31_536_000;

/// Path segment naming the movable alias.
pub const LATEST: &str = "latest";

const UTF8: &str = "; charset=utf-8";

/// Extension to MIME type, and whether the type is text-like.
const TYPES: &[(&str, &str, bool)] = &[
    ("js", "application/javascript", true),
    ("mjs", "application/javascript", true),
    ("css", "text/css", true),
    ("html", "text/html", true),
    ("htm", "text/html", true),
    ("json", "application/json", true),
    ("map", "application/json", true),
    ("txt", "text/plain", true),
    ("xml", "application/xml", true),
    ("svg", "image/svg+xml", true),
    ("png", "image/png", false),
    ("jpg", "image/jpeg", false),
    ("jpeg", "image/jpeg", false),
    ("gif", "image/gif", false),
    ("webp", "image/webp", false),
    ("ico", "image/x-icon", false),
    ("ogg", "audio/ogg", false),
    ("mp3", "audio/mpeg", false),
    ("wav", "audio/wav", false),
    ("mp4", "video/mp4", false),
    ("webm", "video/webm", false),
    ("woff", "font/woff", false),
    ("woff2", "font/woff2", false),
    ("ttf", "font/ttf", false),
    ("otf", "font/otf", false),
    ("wasm", "application/wasm", false),
    ("pdf", "application/pdf", false),
];

/// Returns the `Content-Type` for a file, or `None` for unknown extensions.
///
/// Matching is exact and case-sensitive: `app.JS` has no known type.
/// Text-like types carry a UTF-8 charset parameter.
pub fn content_type(file_path: &str) -> Option<String> {
    let extension = Path::new(file_path).extension()?.to_str()?;
    TYPES
        .iter()
        .find(|(ext, _, _)| *ext == extension)
        .map(|(_, mime, text)| {
            if *text {
                format!("{mime}{UTF8}")
            } else {
                (*mime).to_string()
            }
        })
}

/// Returns the cache lifetime in seconds for a key.
///
/// Only the second segment is inspected.
pub fn max_age(file_path: &str) -> u32 {
    match file_path.split('/').nth(1) {
        Some(LATEST) => LATEST_MAX_AGE,
        _ => VERSIONED_MAX_AGE,
    }
}

/// Returns the `Cache-Control` header value for a key.
pub fn cache_control(file_path: &str) -> String {
    format!("public, max-age={}", max_age(file_path))
}

/// Derives the upload request for a built file.
pub fn upload_payload(artifact: FileArtifact) -> UploadPayload {
    UploadPayload {
        cache_control: cache_control(&artifact.path),
        content_type: content_type(&artifact.path),
        access: Access::PublicRead,
        key: artifact.path,
        body: artifact.content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn text_types_carry_charset() {
        for (path, mime) in [
            ("main/v3/app.js", "application/javascript"),
            ("main/v3/css/site.css", "text/css"),
            ("main/latest/index.html", "text/html"),
            ("main/latest/logo.svg", "image/svg+xml"),
        ] {
            assert_eq!(
                content_type(path).as_deref(),
                Some(format!("{mime}; charset=utf-8").as_str()),
                "{path}"
            );
        }
    }

    #[test]
    fn binary_types_have_no_charset() {
        assert_eq!(content_type("main/v3/logo.png").as_deref(), Some("image/png"));
        assert_eq!(content_type("main/v3/theme.ogg").as_deref(), Some("audio/ogg"));
        assert_eq!(content_type("main/v3/theme.mp3").as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn unknown_or_miscased_extensions_have_no_type() {
        assert_eq!(content_type("main/v3/data.bin"), None);
        assert_eq!(content_type("main/v3/APP.JS"), None);
        assert_eq!(content_type("main/v3/README"), None);
        assert_eq!(content_type("main/v3/.htaccess"), None);
        assert_eq!(content_type("main/v3.js/README"), None);
    }

    #[test]
    fn only_the_second_segment_selects_latest() {
        assert_eq!(max_age("main/latest/app.js"), 10_800);
        assert_eq!(max_age("feature-x/latest/deep/app.js"), 10_800);
        assert_eq!(max_age("main/v3/app.js"), 31_536_000);
        assert_eq!(max_age("main/v3/latest/app.js"), 31_536_000);
        assert_eq!(max_age("latest/v3/app.js"), 31_536_000);
        assert_eq!(max_age("main/latest-ish/app.js"), 31_536_000);
        assert_eq!(max_age("app.js"), 31_536_000);
    }

    #[test]
    fn payload_for_versioned_and_latest_files() {
        let versioned = upload_payload(FileArtifact {
            path: "main/v3/app.js".to_string(),
            content: Bytes::from_static(b"1"),
        });
        assert_eq!(versioned.key, "main/v3/app.js");
        assert_eq!(versioned.access, Access::PublicRead);
        assert_eq!(versioned.cache_control, "public, max-age=31536000");
        assert_eq!(
            versioned.content_type.as_deref(),
            Some("application/javascript; charset=utf-8")
        );

        let latest = upload_payload(FileArtifact {
            path: "main/latest/blob.bin".to_string(),
            content: Bytes::from_static(b"1"),
        });
        assert_eq!(latest.cache_control, "public, max-age=10800");
        assert_eq!(latest.content_type, None);
    }
}
