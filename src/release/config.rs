//! Release option resolution.
//!
//! Caller options are merged with an [`Environment`] snapshot. The snapshot
//! is the only place the process environment is read, so tests can build one
//! explicitly instead of mutating real environment variables.

use path_absolutize::Absolutize;
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable that marks a continuous-integration run.
pub const CI_VAR: &str = "CI";

/// Options accepted by [`Releaser::prepare`](super::Releaser::prepare).
///
/// Every field is optional; only `bucket` is effectively required.
///
/// # Examples
///
/// ```
/// use delivr::ReleaseOptions;
///
/// let options = ReleaseOptions::new().bucket("assets").deploy(false);
/// assert_eq!(options.bucket.as_deref(), Some("assets"));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseOptions {
    /// Project directory; relative paths resolve against the current directory
    pub cwd: Option<PathBuf>,

    /// Destination bucket
    pub bucket: Option<String>,

    /// Whether finalize uploads. Defaults to deploying on CI only.
    pub deploy: Option<bool>,

    /// Branch override for the build-data resolver
    pub branch: Option<String>,

    /// Version override for the build-data resolver
    pub version: Option<String>,
}

impl ReleaseOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the destination bucket.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the deploy flag explicitly.
    pub fn deploy(mut self, deploy: bool) -> Self {
        self.deploy = Some(deploy);
        self
    }

    /// Overrides the branch.
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Overrides the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Process state consulted while resolving options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Directory relative `cwd` options resolve against
    pub current_dir: PathBuf,
    /// Whether this is a CI run
    pub ci: bool,
}

impl Environment {
    /// Creates an explicit snapshot.
    pub fn new(current_dir: impl Into<PathBuf>, ci: bool) -> Self {
        Self {
            current_dir: current_dir.into(),
            ci,
        }
    }

    /// Captures the current directory and the `CI` variable.
    ///
    /// `CI` counts as set when it is present and non-empty.
    pub fn from_process() -> Result<Self, ConfigError> {
        let current_dir = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        let ci = ci_indicator(std::env::var_os(CI_VAR).as_deref());
        Ok(Self { current_dir, ci })
    }
}

/// Whether a `CI` value marks a CI run: any non-empty value does, `"false"`
/// included.
fn ci_indicator(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Validated release configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
    cwd: PathBuf,
    bucket: String,
    deploy: bool,
    branch: Option<String>,
    version: Option<String>,
}

impl ReleaseConfig {
    /// Resolves options against an environment snapshot.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingBucket`] if `bucket` is absent or empty
    /// - [`ConfigError::InvalidCwd`] if `cwd` cannot be made absolute
    pub fn resolve(options: ReleaseOptions, env: &Environment) -> Result<Self, ConfigError> {
        let bucket = match options.bucket {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => return Err(ConfigError::MissingBucket),
        };

        let cwd = match options.cwd {
            Some(cwd) => cwd
                .absolutize_from(&env.current_dir)
                .map_err(|source| ConfigError::InvalidCwd {
                    path: cwd.clone(),
                    source,
                })?
                .into_owned(),
            None => env.current_dir.clone(),
        };

        // Explicit false wins over CI; explicit true deploys anywhere.
        let deploy = options.deploy.unwrap_or(env.ci);

        Ok(Self {
            cwd,
            bucket,
            deploy,
            branch: options.branch,
            version: options.version,
        })
    }

    /// Absolute project directory.
    pub fn cwd(&self) -> &std::path::Path {
        &self.cwd
    }

    /// Destination bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether finalize synchronizes to the bucket.
    pub fn deploy(&self) -> bool {
        self.deploy
    }

    /// Branch override, if any.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Version override, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}
