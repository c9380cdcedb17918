//! Build collaborator seams.
//!
//! A release depends on three build collaborators. They are async because
//! each may run processes or touch the filesystem, and they report failures
//! as [`anyhow::Error`] since their causes are implementation specific. The
//! release layer wraps those errors by phase and never retries.
//!
//! Default implementations live in [`crate::build`].

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use super::config::ReleaseConfig;
use super::context::{BuildContext, BuildMetadata};

/// Resolves the branch, version and any extra metadata of a build.
#[async_trait]
pub trait BuildDataResolver: Send + Sync {
    async fn resolve(&self, config: &ReleaseConfig) -> anyhow::Result<BuildMetadata>;
}

/// Prepares a local directory for the caller to build into.
#[async_trait]
pub trait BuildDirStager: Send + Sync {
    async fn prepare(&self, context: &BuildContext) -> anyhow::Result<Box<dyn StagedDirectory>>;
}

/// A staged local build directory.
#[async_trait]
pub trait StagedDirectory: Send + Sync {
    /// Directory the caller writes build output into
    fn path(&self) -> &Path;

    /// Completes the local side of the release.
    ///
    /// Must finish before the built files can be enumerated.
    async fn finalize(&self) -> anyhow::Result<()>;
}

/// Lists the files of a finalized build.
#[async_trait]
pub trait BuildFileEnumerator: Send + Sync {
    /// Returns one artifact per built file, keyed by bucket path.
    ///
    /// Keys start with the context's version prefix or latest prefix. Paths
    /// must be unique.
    async fn latest(&self, context: &BuildContext) -> anyhow::Result<Vec<FileArtifact>>;
}

/// A built file, keyed by its bucket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    /// Posix-style key such as `main/v3/js/app.js`
    pub path: String,
    /// File content
    pub content: Bytes,
}

impl FileArtifact {
    pub fn new(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}
