//! Temp-directory staging.
//!
//! The caller builds into a fresh temporary directory. The local finalize
//! publishes that tree to `{cwd}/{output}/{branch}/{version}` and
//! `{cwd}/{output}/{branch}/latest`, replacing both. The temp directory is
//! removed when the staged directory is dropped, whether or not finalize
//! succeeded.

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::fs;
use crate::release::policy::LATEST;
use crate::release::{BuildContext, BuildDirStager, StagedDirectory};

/// Directory under `cwd` that finalized builds are published to.
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Stages builds in a temporary directory.
#[derive(Debug, Clone)]
pub struct TempBuildDir {
    output_dir: PathBuf,
    temp_root: Option<PathBuf>,
}

impl Default for TempBuildDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TempBuildDir {
    /// Publishes into `{cwd}/build`, staging under the system temp directory.
    pub fn new() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            temp_root: None,
        }
    }

    /// Sets the publish directory; relative paths are taken from `cwd`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the directory staging directories are created in.
    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }
}

#[async_trait]
impl BuildDirStager for TempBuildDir {
    async fn prepare(&self, context: &BuildContext) -> anyhow::Result<Box<dyn StagedDirectory>> {
        let temp_root = self.temp_root.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&temp_root, false).await?;
        let dir = tempfile::Builder::new()
            .prefix("delivr-")
            .tempdir_in(&temp_root)
            .with_context(|| format!("creating staging directory in {}", temp_root.display()))?;

        let published = context.cwd().join(&self.output_dir).join(context.branch());
        Ok(Box::new(StagedBuildDir {
            dir,
            targets: vec![published.join(context.version()), published.join(LATEST)],
        }))
    }
}

/// A staged temp directory and where it will be published.
///
/// Dropping it deletes the temp directory.
#[derive(Debug)]
pub struct StagedBuildDir {
    dir: TempDir,
    targets: Vec<PathBuf>,
}

#[async_trait]
impl StagedDirectory for StagedBuildDir {
    fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn finalize(&self) -> anyhow::Result<()> {
        for target in &self.targets {
            log::debug!("Publishing {} to {}", self.path().display(), target.display());
            fs::replace_dir(self.path(), target).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::BuildMetadata;

    #[tokio::test]
    async fn finalize_publishes_version_and_latest() {
        let work = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let context =
            BuildContext::new(work.path(), BuildMetadata::new("main", "v3")).unwrap();

        let stager = TempBuildDir::new().temp_root(temp.path());
        let staged = stager.prepare(&context).await.unwrap();
        assert!(staged.path().starts_with(temp.path()));
        std::fs::write(staged.path().join("index.html"), "<p>v3</p>").unwrap();

        let latest = work.path().join("build/main/latest");
        std::fs::create_dir_all(&latest).unwrap();
        std::fs::write(latest.join("old.html"), "<p>v2</p>").unwrap();

        staged.finalize().await.unwrap();
        let staging = staged.path().to_path_buf();
        assert!(staging.exists());
        drop(staged);

        for dir in ["build/main/v3", "build/main/latest"] {
            let published = work.path().join(dir);
            assert_eq!(
                std::fs::read_to_string(published.join("index.html")).unwrap(),
                "<p>v3</p>"
            );
            assert!(!published.join("old.html").exists());
        }
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn failed_finalize_still_removes_staging_dir() {
        let work = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let context = BuildContext::new(work.path(), BuildMetadata::new("main", "v4")).unwrap();
        // A file where the output directory should be makes publishing fail
        std::fs::write(work.path().join("build"), "not a directory").unwrap();

        let staged = TempBuildDir::new()
            .temp_root(temp.path())
            .prepare(&context)
            .await
            .unwrap();
        std::fs::write(staged.path().join("index.html"), "<p>v4</p>").unwrap();
        let staging = staged.path().to_path_buf();

        assert!(staged.finalize().await.is_err());
        drop(staged);

        assert!(!staging.exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unfinalized_staging_dir_is_removed_on_drop() {
        let work = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let context = BuildContext::new(work.path(), BuildMetadata::new("main", "v5")).unwrap();

        let staged = TempBuildDir::new()
            .temp_root(temp.path())
            .prepare(&context)
            .await
            .unwrap();
        let staging = staged.path().to_path_buf();
        assert!(staging.file_name().unwrap().to_string_lossy().starts_with("delivr-"));

        drop(staged);
        assert!(!staging.exists());
        assert!(!work.path().join("build").exists());
    }

    #[tokio::test]
    async fn output_dir_is_configurable() {
        let work = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let context = BuildContext::new(work.path(), BuildMetadata::new("dev", "42")).unwrap();

        let staged = TempBuildDir::new()
            .output_dir("dist")
            .temp_root(temp.path())
            .prepare(&context)
            .await
            .unwrap();
        staged.finalize().await.unwrap();

        assert!(work.path().join("dist/dev/42").is_dir());
        assert!(work.path().join("dist/dev/latest").is_dir());
    }
}
