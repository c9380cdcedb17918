//! Release preparation and the finalize protocol.
//!
//! # Overview
//!
//! A release:
//! 1. Resolves [`ReleaseOptions`] into a [`ReleaseConfig`]
//! 2. Resolves build metadata into a [`BuildContext`]
//! 3. Stages a local directory and hands back a [`ReleaseHandle`]
//! 4. On [`ReleaseHandle::finalize`], finalizes the local build and, when
//!    deploying, replaces `{branch}/{version}` and `{branch}/latest` in the
//!    bucket
//!
//! # Module Organization
//!
//! - [`config`] - option resolution and the environment snapshot
//! - [`context`] - build metadata and the immutable build context
//! - [`coordinator`] - [`Releaser`] and its builder
//! - [`handle`] - [`ReleaseHandle`] and finalize
//! - [`policy`] - content-type and cache-control policy
//! - [`sync`] - delete-then-upload synchronization
//! - [`traits`] - build collaborator seams

pub mod config;
pub mod context;
pub mod coordinator;
pub mod handle;
pub mod policy;
pub mod sync;
pub mod traits;

pub use config::{Environment, ReleaseConfig, ReleaseOptions};
pub use context::{BuildContext, BuildMetadata};
pub use coordinator::{Releaser, ReleaserBuilder};
pub use handle::{FinalizeOutcome, ReleaseHandle};
pub use sync::{ReleaseSynchronizer, SyncReport};
pub use traits::{
    BuildDataResolver, BuildDirStager, BuildFileEnumerator, FileArtifact, StagedDirectory,
};

use crate::error::Result;
use crate::storage::StorageProvider;

/// Prepares a release with the default build collaborators and the process
/// environment.
///
/// Shorthand for building a [`Releaser`] with only a storage provider and
/// calling [`Releaser::prepare`].
pub async fn prepare(
    options: ReleaseOptions,
    storage: impl StorageProvider + 'static,
) -> Result<ReleaseHandle> {
    let releaser = Releaser::builder().storage(storage).build()?;
    releaser.prepare(options).await
}
