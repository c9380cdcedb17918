//! Release preparation.
//!
//! [`Releaser`] wires the build collaborators and the storage provider
//! together and turns [`ReleaseOptions`] into a [`ReleaseHandle`]:
//!
//! 1. Resolve options against the environment (no collaborator is touched if
//!    this fails)
//! 2. Connect a storage client for the bucket
//! 3. Resolve build metadata and bind it into a [`BuildContext`]
//! 4. Stage the local build directory

use std::sync::Arc;

use super::config::{Environment, ReleaseConfig, ReleaseOptions};
use super::context::BuildContext;
use super::handle::ReleaseHandle;
use super::sync::ReleaseSynchronizer;
use super::traits::{BuildDataResolver, BuildDirStager, BuildFileEnumerator};
use crate::build::{GitBuildData, LatestBuildFiles, TempBuildDir};
use crate::error::{ConfigError, ReleaseError, Result};
use crate::storage::StorageProvider;

/// Prepares releases.
///
/// # Examples
///
/// ```no_run
/// use delivr::{ReleaseOptions, Releaser};
/// use delivr::storage::LocalProvider;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let releaser = Releaser::builder()
///     .storage(LocalProvider::new("/srv/buckets"))
///     .build()?;
///
/// let release = releaser
///     .prepare(ReleaseOptions::new().bucket("assets"))
///     .await?;
/// std::fs::write(release.path().join("index.html"), "<h1>hi</h1>")?;
/// release.finalize().await?;
/// # Ok(())
/// # }
/// ```
pub struct Releaser {
    data: Arc<dyn BuildDataResolver>,
    stager: Arc<dyn BuildDirStager>,
    files: Arc<dyn BuildFileEnumerator>,
    storage: Arc<dyn StorageProvider>,
    env: Environment,
}

impl std::fmt::Debug for Releaser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Releaser")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl Releaser {
    /// Starts a builder with the default build collaborators.
    pub fn builder() -> ReleaserBuilder {
        ReleaserBuilder::new()
    }

    /// Resolves options without starting a release.
    pub fn resolve(
        &self,
        options: ReleaseOptions,
    ) -> std::result::Result<ReleaseConfig, ConfigError> {
        ReleaseConfig::resolve(options, &self.env)
    }

    /// Resolves options and stages a release.
    ///
    /// # Errors
    ///
    /// - [`ReleaseError::Config`] before any collaborator is invoked
    /// - [`ReleaseError::BuildData`] if metadata cannot be resolved or breaks
    ///   the `{branch}/{version}` layout
    /// - [`ReleaseError::Staging`] if the local directory cannot be prepared
    pub async fn prepare(&self, options: ReleaseOptions) -> Result<ReleaseHandle> {
        let config = self.resolve(options)?;
        self.prepare_config(config).await
    }

    /// Stages a release from an already resolved configuration.
    pub async fn prepare_config(&self, config: ReleaseConfig) -> Result<ReleaseHandle> {
        let storage = self.storage.connect(config.bucket());

        let metadata = self
            .data
            .resolve(&config)
            .await
            .map_err(ReleaseError::BuildData)?;
        let context = BuildContext::new(config.cwd(), metadata).map_err(ReleaseError::BuildData)?;
        log::info!(
            "Preparing release {} for bucket {} (deploy: {})",
            context.version_prefix(),
            config.bucket(),
            config.deploy()
        );

        let dir = self
            .stager
            .prepare(&context)
            .await
            .map_err(ReleaseError::Staging)?;
        log::debug!("Staged build directory {}", dir.path().display());

        Ok(ReleaseHandle::new(
            dir,
            context,
            config.deploy(),
            ReleaseSynchronizer::new(storage, Arc::clone(&self.files)),
        ))
    }
}

/// Builder for constructing a [`Releaser`].
///
/// Only the storage provider is required. Unset collaborators default to
/// [`GitBuildData`], [`TempBuildDir`] and [`LatestBuildFiles`], and the
/// environment defaults to [`Environment::from_process`].
#[derive(Default)]
pub struct ReleaserBuilder {
    data: Option<Arc<dyn BuildDataResolver>>,
    stager: Option<Arc<dyn BuildDirStager>>,
    files: Option<Arc<dyn BuildFileEnumerator>>,
    storage: Option<Arc<dyn StorageProvider>>,
    env: Option<Environment>,
}

impl ReleaserBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the build-data resolver.
    pub fn build_data(mut self, data: impl BuildDataResolver + 'static) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Sets the build-directory stager.
    pub fn stager(mut self, stager: impl BuildDirStager + 'static) -> Self {
        self.stager = Some(Arc::new(stager));
        self
    }

    /// Sets the build-file enumerator.
    pub fn files(mut self, files: impl BuildFileEnumerator + 'static) -> Self {
        self.files = Some(Arc::new(files));
        self
    }

    /// Sets the storage provider.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn storage(mut self, storage: impl StorageProvider + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Sets the environment snapshot.
    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Builds the releaser.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingStorage`] if no storage provider was set
    /// - [`ConfigError::CurrentDir`] if the environment has to be captured
    ///   and the current directory is unreadable
    pub fn build(self) -> std::result::Result<Releaser, ConfigError> {
        let storage = self.storage.ok_or(ConfigError::MissingStorage)?;
        let env = match self.env {
            Some(env) => env,
            None => Environment::from_process()?,
        };

        Ok(Releaser {
            data: self.data.unwrap_or_else(|| Arc::new(GitBuildData::new())),
            stager: self.stager.unwrap_or_else(|| Arc::new(TempBuildDir::new())),
            files: self.files.unwrap_or_else(|| Arc::new(LatestBuildFiles::new())),
            storage,
            env,
        })
    }
}
