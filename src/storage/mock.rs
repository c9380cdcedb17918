//! In-memory storage for deterministic testing.
//!
//! Records every call as a [`StorageOperation`], in the order the calls start
//! and finish, so tests can assert on interleaving as well as content. Each
//! operation yields to the executor between starting and finishing, which lets
//! concurrently issued calls overlap the way network calls would.
//!
//! # Example
//!
//! ```
//! use delivr::storage::{MockStorage, StorageClient, StorageOperation, StorageProvider};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let provider = MockStorage::new().fail_on_delete("main/latest");
//! let client = provider.connect("assets");
//!
//! assert!(client.delete_dir("main/latest").await.is_err());
//! assert_eq!(
//!     provider.operations()[0],
//!     StorageOperation::Connect { bucket: "assets".to_string() }
//! );
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{StorageClient, StorageError, StorageProvider, UploadPayload};

/// Mock storage, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    bucket: String,
    inner: Arc<Mutex<MockStorageInner>>,
}

#[derive(Debug, Default)]
struct MockStorageInner {
    /// Objects currently stored, by key.
    objects: BTreeMap<String, UploadPayload>,
    /// Upload keys that should fail.
    failing_uploads: HashSet<String>,
    /// Delete prefixes that should fail.
    failing_deletes: HashSet<String>,
    /// Recorded operations for verification.
    operations: Vec<StorageOperation>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOperation {
    Connect { bucket: String },
    DeleteStarted { prefix: String },
    DeleteFinished { prefix: String },
    DeleteFailed { prefix: String },
    UploadStarted { key: String },
    UploadFinished { payload: UploadPayload },
    UploadFailed { key: String },
}

impl MockStorage {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every upload to `key`.
    pub fn fail_on_upload(self, key: impl Into<String>) -> Self {
        self.lock().failing_uploads.insert(key.into());
        self
    }

    /// Fail every deletion of `prefix`.
    pub fn fail_on_delete(self, prefix: impl Into<String>) -> Self {
        self.lock().failing_deletes.insert(prefix.into());
        self
    }

    /// Seed an object, bypassing the operation log.
    pub fn insert(&self, payload: UploadPayload) {
        self.lock().objects.insert(payload.key.clone(), payload);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<StorageOperation> {
        self.lock().operations.clone()
    }

    /// Payloads of successful uploads, in completion order.
    pub fn uploads(&self) -> Vec<UploadPayload> {
        self.lock()
            .operations
            .iter()
            .filter_map(|op| match op {
                StorageOperation::UploadFinished { payload } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Prefixes passed to `delete_dir`, in call order.
    pub fn deleted_prefixes(&self) -> Vec<String> {
        self.lock()
            .operations
            .iter()
            .filter_map(|op| match op {
                StorageOperation::DeleteStarted { prefix } => Some(prefix.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Get a stored object.
    pub fn object(&self, key: &str) -> Option<UploadPayload> {
        self.lock().objects.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockStorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: StorageOperation) {
        self.lock().operations.push(op);
    }
}

#[async_trait]
impl StorageClient for MockStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, payload: UploadPayload) -> Result<(), StorageError> {
        self.record(StorageOperation::UploadStarted {
            key: payload.key.clone(),
        });
        tokio::task::yield_now().await;

        let mut inner = self.lock();
        if inner.failing_uploads.contains(&payload.key) {
            inner.operations.push(StorageOperation::UploadFailed {
                key: payload.key.clone(),
            });
            return Err(StorageError::Rejected(format!("upload of {}", payload.key)));
        }
        inner.objects.insert(payload.key.clone(), payload.clone());
        inner
            .operations
            .push(StorageOperation::UploadFinished { payload });
        Ok(())
    }

    async fn delete_dir(&self, prefix: &str) -> Result<(), StorageError> {
        self.record(StorageOperation::DeleteStarted {
            prefix: prefix.to_string(),
        });
        tokio::task::yield_now().await;

        let mut inner = self.lock();
        if inner.failing_deletes.contains(prefix) {
            inner.operations.push(StorageOperation::DeleteFailed {
                prefix: prefix.to_string(),
            });
            return Err(StorageError::Rejected(format!("delete of {prefix}")));
        }
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        inner.objects.retain(|key, _| !key.starts_with(&dir));
        inner.operations.push(StorageOperation::DeleteFinished {
            prefix: prefix.to_string(),
        });
        Ok(())
    }
}

impl StorageProvider for MockStorage {
    fn connect(&self, bucket: &str) -> Arc<dyn StorageClient> {
        self.record(StorageOperation::Connect {
            bucket: bucket.to_string(),
        });
        Arc::new(MockStorage {
            bucket: bucket.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Access;
    use bytes::Bytes;

    fn payload(key: &str) -> UploadPayload {
        UploadPayload {
            key: key.to_string(),
            body: Bytes::from_static(b"x"),
            access: Access::PublicRead,
            cache_control: "public, max-age=31536000".to_string(),
            content_type: None,
        }
    }

    #[tokio::test]
    async fn delete_dir_removes_only_keys_under_prefix() {
        let storage = MockStorage::new();
        storage.insert(payload("main/v1/a.js"));
        storage.insert(payload("main/v10/a.js"));
        storage.insert(payload("main/latest/a.js"));

        storage.delete_dir("main/v1").await.unwrap();

        assert_eq!(storage.keys(), vec!["main/latest/a.js", "main/v10/a.js"]);
    }

    #[tokio::test]
    async fn clients_share_state_with_provider() {
        let provider = MockStorage::new();
        let client = provider.connect("assets");
        client.upload(payload("main/v1/a.js")).await.unwrap();

        assert_eq!(client.bucket(), "assets");
        assert!(provider.object("main/v1/a.js").is_some());
        assert_eq!(provider.uploads().len(), 1);
    }

    #[tokio::test]
    async fn configured_failures_are_recorded() {
        let storage = MockStorage::new().fail_on_upload("main/v1/a.js");
        assert!(storage.upload(payload("main/v1/a.js")).await.is_err());
        assert!(storage.object("main/v1/a.js").is_none());
        assert_eq!(
            storage.operations().last(),
            Some(&StorageOperation::UploadFailed {
                key: "main/v1/a.js".to_string()
            })
        );
    }
}
