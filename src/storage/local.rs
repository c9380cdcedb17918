//! Directory-backed bucket.
//!
//! Objects live at `{root}/{key}`. Delivery metadata for each object lives in
//! a JSON sidecar at `{root}/.delivr/{key}.json`, so a prefix deletion removes
//! both trees.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    Access, StorageClient, StorageError, StorageProvider, UploadPayload, key_segments,
};

/// Directory holding metadata sidecars, relative to the bucket root.
const METADATA_DIR: &str = ".delivr";

/// Delivery metadata recorded next to every uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Canned ACL
    pub access: Access,
    /// `Cache-Control` value
    pub cache_control: String,
    /// `Content-Type` value, if one was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Body length in bytes
    pub size: u64,
    /// Hex-encoded SHA-256 of the body
    pub etag: String,
}

/// A bucket stored as a directory tree.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    bucket: String,
    root: PathBuf,
}

impl LocalStorage {
    /// Creates a client for `bucket` rooted at `root`.
    ///
    /// The directory is created lazily by the first upload.
    pub fn new(bucket: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            root: root.into(),
        }
    }

    /// Reads an object body.
    pub async fn read_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        let content = tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))?;
        Ok(Bytes::from(content))
    }

    /// Reads the delivery metadata recorded for an object.
    pub async fn read_metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let path = self.metadata_path(key)?;
        let content = tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Whether an object exists at `key`.
    pub async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let segments = key_segments(key)?;
        if segments.first() == Some(&METADATA_DIR) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(segments.iter().fold(self.root.clone(), |p, s| p.join(s)))
    }

    fn metadata_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let object = self.object_path(key)?;
        let relative = object
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidKey(key.to_string()))?;
        let mut path = self.root.join(METADATA_DIR).join(relative);
        let file_name = format!(
            "{}.json",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        path.set_file_name(file_name);
        Ok(path)
    }

    fn metadata_dir(&self, prefix: &str) -> Result<PathBuf, StorageError> {
        let object = self.object_path(prefix)?;
        let relative = object
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidKey(prefix.to_string()))?;
        Ok(self.root.join(METADATA_DIR).join(relative))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, payload: UploadPayload) -> Result<(), StorageError> {
        let object_path = self.object_path(&payload.key)?;
        let metadata_path = self.metadata_path(&payload.key)?;

        let metadata = ObjectMetadata {
            access: payload.access,
            cache_control: payload.cache_control,
            content_type: payload.content_type,
            size: payload.body.len() as u64,
            etag: hex::encode(Sha256::digest(&payload.body)),
        };

        write_file(&object_path, &payload.body).await?;
        write_file(&metadata_path, &serde_json::to_vec_pretty(&metadata)?).await?;

        log::debug!(
            "Stored {}/{} ({} bytes, {})",
            self.bucket,
            payload.key,
            metadata.size,
            metadata.cache_control
        );
        Ok(())
    }

    async fn delete_dir(&self, prefix: &str) -> Result<(), StorageError> {
        remove_dir_all(&self.object_path(prefix)?).await?;
        remove_dir_all(&self.metadata_dir(prefix)?).await?;
        log::debug!("Deleted {}/{}/", self.bucket, prefix);
        Ok(())
    }
}

/// Maps bucket names to subdirectories of a common root.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Buckets will be stored under `root/{bucket}`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StorageProvider for LocalProvider {
    fn connect(&self, bucket: &str) -> Arc<dyn StorageClient> {
        Arc::new(LocalStorage::new(bucket, self.root.join(bucket)))
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| io_error(path, e))
}

async fn remove_dir_all(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(io_error(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(key: &str, body: &'static str) -> UploadPayload {
        UploadPayload {
            key: key.to_string(),
            body: Bytes::from_static(body.as_bytes()),
            access: Access::PublicRead,
            cache_control: "public, max-age=10800".to_string(),
            content_type: Some("text/css; charset=utf-8".to_string()),
        }
    }

    #[tokio::test]
    async fn upload_records_body_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("assets", dir.path());

        storage
            .upload(payload("main/latest/css/site.css", "body{}"))
            .await
            .unwrap();

        let body = storage.read_object("main/latest/css/site.css").await.unwrap();
        assert_eq!(&body[..], b"body{}");

        let meta = storage
            .read_metadata("main/latest/css/site.css")
            .await
            .unwrap();
        assert_eq!(meta.access, Access::PublicRead);
        assert_eq!(meta.cache_control, "public, max-age=10800");
        assert_eq!(meta.content_type.as_deref(), Some("text/css; charset=utf-8"));
        assert_eq!(meta.size, 6);
        assert_eq!(meta.etag.len(), 64);
        assert!(
            dir.path()
                .join(".delivr/main/latest/css/site.css.json")
                .is_file()
        );
    }

    #[tokio::test]
    async fn delete_dir_removes_objects_and_metadata_under_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("assets", dir.path());
        storage.upload(payload("main/v1/a.css", "a")).await.unwrap();
        storage.upload(payload("main/v2/b.css", "b")).await.unwrap();

        storage.delete_dir("main/v1").await.unwrap();

        assert!(!storage.contains("main/v1/a.css").await.unwrap());
        assert!(storage.read_metadata("main/v1/a.css").await.is_err());
        assert!(storage.contains("main/v2/b.css").await.unwrap());
    }

    #[tokio::test]
    async fn delete_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("assets", dir.path());
        storage.delete_dir("main/latest").await.unwrap();
        storage.delete_dir("main/latest").await.unwrap();
    }

    #[tokio::test]
    async fn metadata_tree_is_not_addressable() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("assets", dir.path());
        let err = storage
            .upload(payload(".delivr/main/x.css", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[test]
    fn provider_roots_each_bucket_separately() {
        let provider = LocalProvider::new("/srv/buckets");
        let client = provider.connect("assets");
        assert_eq!(client.bucket(), "assets");
    }
}
