//! Error types for release preparation and synchronization.
//!
//! Each variant corresponds to one phase of a release so callers can tell
//! whether the remote bucket may have been touched.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Invalid or incomplete options
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Build metadata could not be resolved or was unusable
    #[error("build data error: {0:#}")]
    BuildData(anyhow::Error),

    /// The local build directory could not be staged
    #[error("staging error: {0:#}")]
    Staging(anyhow::Error),

    /// The staged directory failed its own local finalize step
    #[error("local finalize error: {0:#}")]
    LocalFinalize(anyhow::Error),

    /// Remote synchronization failed
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Option resolution errors.
///
/// Always raised before any collaborator is invoked.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No bucket was given, or it was empty
    #[error("A bucket name is required to upload build files.")]
    MissingBucket,

    /// A releaser was built without a storage provider
    #[error("A storage provider is required to build a releaser.")]
    MissingStorage,

    /// The process working directory could not be read
    #[error("unable to read current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// The configured working directory could not be made absolute
    #[error("invalid working directory {path}: {source}")]
    InvalidCwd {
        /// Path as given
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Failures while replacing remote content.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The build-file enumerator failed
    #[error("failed to enumerate built files: {0:#}")]
    Enumerate(anyhow::Error),

    /// The enumerator produced the same path twice
    #[error("duplicate build file: {0}")]
    DuplicateArtifact(String),

    /// A prefix deletion failed
    #[error("failed to delete {prefix}: {source}")]
    Delete {
        /// Remote prefix
        prefix: String,
        /// Storage failure
        #[source]
        source: StorageError,
    },

    /// At least one upload failed
    #[error("failed to upload {key} ({failed} upload(s) failed): {source}")]
    Upload {
        /// Key of the first failed upload, in enumeration order
        key: String,
        /// Total number of failed uploads in the batch
        failed: usize,
        /// Storage failure for `key`
        #[source]
        source: StorageError,
    },
}

impl ReleaseError {
    /// Whether the remote bucket may have been left partially updated.
    ///
    /// Only deletion and upload failures reach the bucket. Everything else
    /// fails before the first remote call.
    pub fn remote_may_be_inconsistent(&self) -> bool {
        matches!(
            self,
            ReleaseError::Sync(SyncError::Delete { .. } | SyncError::Upload { .. })
        )
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::MissingBucket) => {
                vec!["Pass a bucket name in the release options".to_string()]
            }
            ReleaseError::Config(ConfigError::MissingStorage) => {
                vec!["Set a storage provider on the releaser builder".to_string()]
            }
            ReleaseError::Config(_) => {
                vec!["Check that the working directory exists and is readable".to_string()]
            }
            ReleaseError::BuildData(_) => vec![
                "Provide explicit branch and version options".to_string(),
                "Ensure the working directory is a git checkout with at least one commit"
                    .to_string(),
            ],
            ReleaseError::Staging(_) | ReleaseError::LocalFinalize(_) => {
                vec!["Check free disk space and permissions on the build directories".to_string()]
            }
            ReleaseError::Sync(SyncError::Enumerate(_) | SyncError::DuplicateArtifact(_)) => {
                vec!["The bucket was not modified; fix the build output and re-run".to_string()]
            }
            ReleaseError::Sync(_) => vec![
                "The release may be inconsistent remotely".to_string(),
                "Re-run finalize to replace both prefixes again".to_string(),
            ],
        }
    }
}
