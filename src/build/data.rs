//! Git-backed build metadata.

use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::release::{BuildDataResolver, BuildMetadata, ReleaseConfig};

/// Resolves branch and version from the git checkout at the release `cwd`.
///
/// - branch: the `branch` option, else the checked-out branch
/// - version: the `version` option, else the abbreviated `HEAD` commit
///
/// `/` in branch names is replaced by `-` so each branch stays a single
/// bucket path segment. When git is consulted, the full commit hash is
/// recorded as the extra `commit` field.
#[derive(Debug, Clone, Default)]
pub struct GitBuildData;

impl GitBuildData {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildDataResolver for GitBuildData {
    async fn resolve(&self, config: &ReleaseConfig) -> anyhow::Result<BuildMetadata> {
        let cwd = config.cwd();

        let branch = match config.branch() {
            Some(branch) => branch.to_string(),
            None => {
                let branch = git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
                if branch == "HEAD" {
                    anyhow::bail!(
                        "{} has a detached HEAD; pass a branch option to name the release line",
                        cwd.display()
                    );
                }
                branch
            }
        };

        let metadata = match config.version() {
            Some(version) => BuildMetadata::new(sanitize_branch(&branch), version),
            None => {
                let version = git(cwd, &["rev-parse", "--short", "HEAD"]).await?;
                let commit = git(cwd, &["rev-parse", "HEAD"]).await?;
                BuildMetadata::new(sanitize_branch(&branch), version)
                    .with_field("commit", commit.into())
            }
        };

        log::debug!(
            "Resolved build data: branch {}, version {}",
            metadata.branch,
            metadata.version
        );
        Ok(metadata)
    }
}

/// Makes a branch name usable as a single path segment.
fn sanitize_branch(branch: &str) -> String {
    branch.replace('/', "-")
}

async fn git(cwd: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed in {}: {}",
            args.join(" "),
            cwd.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
