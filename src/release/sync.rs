//! Remote synchronization of a finalized build.
//!
//! # Protocol
//!
//! 1. Enumerate the built files
//! 2. Delete `{branch}/{version}` and `{branch}/latest` concurrently
//! 3. Once both deletions have settled, upload every file concurrently
//!
//! Each step is one concurrent batch that is awaited in full before the next
//! starts, so no upload can race a deletion of its own prefix. A failing
//! operation does not cancel its siblings in the same batch.
//!
//! Replacement is not atomic: readers of the bucket can observe a missing or
//! mixed release while step 3 is running, and a failed upload leaves the
//! prefixes partially populated.

use futures::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::context::BuildContext;
use super::policy::upload_payload;
use super::traits::{BuildFileEnumerator, FileArtifact};
use crate::error::SyncError;
use crate::storage::{StorageClient, StorageError};

/// Summary of a completed synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Bucket written to
    pub bucket: String,
    /// Prefixes cleared before uploading
    pub deleted_prefixes: Vec<String>,
    /// Uploaded keys, in enumeration order
    pub uploaded: Vec<String>,
}

/// Replaces the remote content of one release.
pub struct ReleaseSynchronizer {
    storage: Arc<dyn StorageClient>,
    files: Arc<dyn BuildFileEnumerator>,
}

impl ReleaseSynchronizer {
    pub fn new(storage: Arc<dyn StorageClient>, files: Arc<dyn BuildFileEnumerator>) -> Self {
        Self { storage, files }
    }

    /// Runs the protocol for `context`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Enumerate`] / [`SyncError::DuplicateArtifact`] before
    ///   the bucket is touched
    /// - [`SyncError::Delete`] after both deletions have settled; nothing is
    ///   uploaded
    /// - [`SyncError::Upload`] after every upload has settled; successful
    ///   uploads are kept
    pub async fn synchronize(&self, context: &BuildContext) -> Result<SyncReport, SyncError> {
        let artifacts = self
            .files
            .latest(context)
            .await
            .map_err(SyncError::Enumerate)?;
        ensure_unique(&artifacts)?;
        log::info!(
            "Synchronizing {} file(s) to bucket {}",
            artifacts.len(),
            self.storage.bucket()
        );

        let prefixes = vec![context.version_prefix(), context.latest_prefix()];
        self.delete_prefixes(&prefixes).await?;
        let uploaded = self.upload_all(artifacts).await?;

        log::info!(
            "Uploaded {} file(s) under {}",
            uploaded.len(),
            prefixes.join(" and ")
        );
        Ok(SyncReport {
            bucket: self.storage.bucket().to_string(),
            deleted_prefixes: prefixes,
            uploaded,
        })
    }

    async fn delete_prefixes(&self, prefixes: &[String]) -> Result<(), SyncError> {
        for prefix in prefixes {
            log::debug!("Deleting {}/{}/", self.storage.bucket(), prefix);
        }

        let failures = settle(
            prefixes,
            prefixes.iter().map(|prefix| self.storage.delete_dir(prefix)),
        )
        .await;

        match failures.into_iter().next() {
            Some((prefix, source)) => Err(SyncError::Delete { prefix, source }),
            None => Ok(()),
        }
    }

    async fn upload_all(&self, artifacts: Vec<FileArtifact>) -> Result<Vec<String>, SyncError> {
        let payloads: Vec<_> = artifacts.into_iter().map(upload_payload).collect();
        let keys: Vec<String> = payloads.iter().map(|p| p.key.clone()).collect();

        for payload in &payloads {
            log::debug!(
                "Uploading {} ({}, {})",
                payload.key,
                payload.cache_control,
                payload.content_type.as_deref().unwrap_or("no content type")
            );
        }

        let failures = settle(
            &keys,
            payloads
                .into_iter()
                .map(|payload| self.storage.upload(payload)),
        )
        .await;

        let failed = failures.len();
        match failures.into_iter().next() {
            Some((key, source)) => Err(SyncError::Upload {
                key,
                failed,
                source,
            }),
            None => Ok(keys),
        }
    }
}

/// Awaits a batch of storage operations concurrently.
///
/// Returns the failures, labelled and in input order, once every operation
/// has finished.
async fn settle<F>(
    labels: &[String],
    operations: impl IntoIterator<Item = F>,
) -> Vec<(String, StorageError)>
where
    F: Future<Output = Result<(), StorageError>>,
{
    let results = join_all(operations).await;
    labels
        .iter()
        .zip(results)
        .filter_map(|(label, result)| {
            result.err().map(|e| {
                log::error!("{label}: {e}");
                (label.clone(), e)
            })
        })
        .collect()
}

fn ensure_unique(artifacts: &[FileArtifact]) -> Result<(), SyncError> {
    let mut seen = HashSet::with_capacity(artifacts.len());
    for artifact in artifacts {
        if !seen.insert(artifact.path.as_str()) {
            return Err(SyncError::DuplicateArtifact(artifact.path.clone()));
        }
    }
    Ok(())
}
