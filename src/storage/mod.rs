//! Object storage seam.
//!
//! A [`StorageClient`] is bound to a single bucket and exposes the two
//! operations a release needs: upload one object with delivery metadata, and
//! delete everything under a prefix. A [`StorageProvider`] constructs clients
//! from a bucket name.
//!
//! Backends:
//! - [`local::LocalStorage`] - a directory per bucket, metadata in JSON sidecars
//! - [`mock::MockStorage`] - in-memory recorder for tests

pub mod local;
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use local::{LocalProvider, LocalStorage, ObjectMetadata};
pub use mock::{MockStorage, StorageOperation};

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key or prefix cannot be mapped to an object location
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Filesystem failure in a local backend
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Object metadata could not be encoded or decoded
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The backend refused the request
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Canned access control applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// Readable by anyone
    PublicRead,
}

impl Access {
    /// Wire name of the canned ACL
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::PublicRead => "public-read",
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object to upload, with its HTTP delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    /// Object key, e.g. `main/v3/app.js`
    pub key: String,
    /// Object content
    pub body: Bytes,
    /// Canned ACL
    pub access: Access,
    /// `Cache-Control` header value
    pub cache_control: String,
    /// `Content-Type` header value; omitted from the request when `None`
    pub content_type: Option<String>,
}

/// A client bound to one bucket.
///
/// Implementations must tolerate concurrent calls from the same caller; a
/// release issues both deletions at once and then every upload at once.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Bucket this client writes to
    fn bucket(&self) -> &str;

    /// Uploads a single object, replacing any existing object at the key
    async fn upload(&self, payload: UploadPayload) -> Result<(), StorageError>;

    /// Deletes every object whose key starts with `prefix/`.
    ///
    /// Deleting an empty prefix succeeds.
    async fn delete_dir(&self, prefix: &str) -> Result<(), StorageError>;
}

/// Constructs storage clients for a bucket.
pub trait StorageProvider: Send + Sync {
    /// Returns a client bound to `bucket`
    fn connect(&self, bucket: &str) -> Arc<dyn StorageClient>;
}

/// Splits a key or prefix into validated segments.
///
/// Rejects absolute keys, empty segments, and `.`/`..` segments so that a key
/// can never escape its bucket in path-backed implementations.
pub(crate) fn key_segments(key: &str) -> Result<Vec<&str>, StorageError> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let segments: Vec<&str> = key.trim_end_matches('/').split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_segments_accepts_nested_keys() {
        assert_eq!(
            key_segments("main/v3/js/app.js").unwrap(),
            vec!["main", "v3", "js", "app.js"]
        );
        assert_eq!(key_segments("main/latest/").unwrap(), vec!["main", "latest"]);
    }

    #[test]
    fn key_segments_rejects_escapes() {
        for key in ["", "/main/v3", "main/../etc", "main//v3", "main/./v3", "a\\b"] {
            assert!(
                matches!(key_segments(key), Err(StorageError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn access_wire_names() {
        assert_eq!(Access::PublicRead.to_string(), "public-read");
        assert_eq!(
            serde_json::to_string(&Access::PublicRead).unwrap(),
            "\"public-read\""
        );
    }
}
