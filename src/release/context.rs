//! Build metadata and the immutable build context.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::policy::LATEST;

/// Metadata describing one build, produced by a build-data resolver.
///
/// `branch` and `version` place the release in the bucket; any other fields
/// are carried through to the stager and enumerator untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Release line, e.g. `main`
    pub branch: String,

    /// Immutable release identifier, e.g. `v3` or a commit hash
    pub version: String,

    /// Resolver-specific fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BuildMetadata {
    /// Metadata with no extra fields.
    pub fn new(branch: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            version: version.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Adds a resolver-specific field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Everything the build stages after metadata resolution need.
///
/// Constructed once per release and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildContext {
    cwd: PathBuf,
    metadata: BuildMetadata,
}

impl BuildContext {
    /// Binds metadata to a project directory.
    ///
    /// # Errors
    ///
    /// Fails if `branch` or `version` is empty or contains `/`, or if the
    /// version is `latest`. Each of these would make the version prefix and
    /// the alias prefix overlap or nest.
    pub fn new(cwd: impl Into<PathBuf>, metadata: BuildMetadata) -> anyhow::Result<Self> {
        check_segment("branch", &metadata.branch)?;
        check_segment("version", &metadata.version)?;
        if metadata.version == LATEST {
            anyhow::bail!("version must not be `{LATEST}`; it is reserved for the alias prefix");
        }
        Ok(Self {
            cwd: cwd.into(),
            metadata,
        })
    }

    /// Absolute project directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolved metadata.
    pub fn metadata(&self) -> &BuildMetadata {
        &self.metadata
    }

    /// Release branch.
    pub fn branch(&self) -> &str {
        &self.metadata.branch
    }

    /// Release version.
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// `{branch}/{version}`
    pub fn version_prefix(&self) -> String {
        format!("{}/{}", self.metadata.branch, self.metadata.version)
    }

    /// `{branch}/latest`
    pub fn latest_prefix(&self) -> String {
        format!("{}/{LATEST}", self.metadata.branch)
    }
}

fn check_segment(field: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        anyhow::bail!("build {field} is empty");
    }
    if value.contains('/') || value == "." || value == ".." {
        anyhow::bail!("build {field} `{value}` is not a single path segment");
    }
    Ok(())
}
