//! The handle returned by [`Releaser::prepare`](super::Releaser::prepare).

use std::path::Path;

use super::context::BuildContext;
use super::sync::{ReleaseSynchronizer, SyncReport};
use super::traits::StagedDirectory;
use crate::error::{ReleaseError, Result};

/// How a finalize call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Deploying was off; only the local finalize ran
    Skipped,
    /// Both prefixes were replaced
    Synchronized(SyncReport),
}

/// A staged release awaiting its build output.
///
/// Write the build into [`path`](Self::path), then call
/// [`finalize`](Self::finalize). Finalizing consumes the handle, so it runs at
/// most once.
pub struct ReleaseHandle {
    dir: Box<dyn StagedDirectory>,
    context: BuildContext,
    deploy: bool,
    synchronizer: ReleaseSynchronizer,
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("path", &self.dir.path())
            .field("context", &self.context)
            .field("deploy", &self.deploy)
            .finish_non_exhaustive()
    }
}

impl ReleaseHandle {
    pub(crate) fn new(
        dir: Box<dyn StagedDirectory>,
        context: BuildContext,
        deploy: bool,
        synchronizer: ReleaseSynchronizer,
    ) -> Self {
        Self {
            dir,
            context,
            deploy,
            synchronizer,
        }
    }

    /// Local directory to build into.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Context the release was staged with.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Whether [`finalize`](Self::finalize) will synchronize to the bucket.
    pub fn will_deploy(&self) -> bool {
        self.deploy
    }

    /// Finalizes the local build and, when deploying, replaces the remote
    /// `{branch}/{version}` and `{branch}/latest` prefixes with it.
    ///
    /// # Errors
    ///
    /// A [`ReleaseError::LocalFinalize`] means nothing remote was attempted.
    /// Any error for which [`ReleaseError::remote_may_be_inconsistent`]
    /// returns true means the bucket may hold a partial release; nothing is
    /// rolled back.
    pub async fn finalize(self) -> Result<FinalizeOutcome> {
        let Self {
            dir,
            context,
            deploy,
            synchronizer,
        } = self;

        dir.finalize().await.map_err(ReleaseError::LocalFinalize)?;
        log::debug!("Finalized local build at {}", dir.path().display());
        // Staging is no longer needed once published locally
        drop(dir);

        if !deploy {
            log::info!("Not deploying {}; skipping upload", context.version_prefix());
            return Ok(FinalizeOutcome::Skipped);
        }

        let report = synchronizer.synchronize(&context).await?;
        Ok(FinalizeOutcome::Synchronized(report))
    }
}
