//! Enumeration of published build files.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use super::dir::DEFAULT_OUTPUT_DIR;
use crate::release::policy::LATEST;
use crate::release::{BuildContext, BuildFileEnumerator, FileArtifact};

/// Lists every file under `{cwd}/{output}/{branch}/{version}` and
/// `{cwd}/{output}/{branch}/latest`.
///
/// Keys are relative to the output directory, so they start with the version
/// or latest prefix. Artifacts are returned sorted by key.
#[derive(Debug, Clone)]
pub struct LatestBuildFiles {
    output_dir: PathBuf,
}

impl Default for LatestBuildFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestBuildFiles {
    pub fn new() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    /// Sets the publish directory; relative paths are taken from `cwd`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

#[async_trait]
impl BuildFileEnumerator for LatestBuildFiles {
    async fn latest(&self, context: &BuildContext) -> anyhow::Result<Vec<FileArtifact>> {
        let root = context.cwd().join(&self.output_dir);
        let dirs = [
            root.join(context.branch()).join(context.version()),
            root.join(context.branch()).join(LATEST),
        ];

        let artifacts = tokio::task::spawn_blocking(move || collect(&root, &dirs))
            .await
            .context("file enumeration task panicked")??;

        log::debug!("Enumerated {} built file(s)", artifacts.len());
        Ok(artifacts)
    }
}

fn collect(root: &Path, dirs: &[PathBuf]) -> anyhow::Result<Vec<FileArtifact>> {
    let mut artifacts = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            anyhow::bail!("no build output at {}", dir.display());
        }

        for entry in walkdir::WalkDir::new(dir).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let content = std::fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            artifacts.push(FileArtifact {
                path: posix_key(entry.path().strip_prefix(root)?)?,
                content: Bytes::from(content),
            });
        }
    }

    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

/// Joins the components of a relative path with `/`.
fn posix_key(relative: &Path) -> anyhow::Result<String> {
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment
                .to_str()
                .with_context(|| format!("{} is not valid UTF-8", relative.display())),
            _ => anyhow::bail!("unexpected component in {}", relative.display()),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::BuildMetadata;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn lists_version_and_latest_files_with_posix_keys() {
        let work = tempfile::tempdir().unwrap();
        write(work.path(), "build/main/v3/js/app.js", "app");
        write(work.path(), "build/main/v3/index.html", "index");
        write(work.path(), "build/main/latest/js/app.js", "app");
        write(work.path(), "build/main/latest/index.html", "index");
        write(work.path(), "build/main/v2/old.js", "stale");
        write(work.path(), "build/dev/latest/other.js", "other");

        let context = BuildContext::new(work.path(), BuildMetadata::new("main", "v3")).unwrap();
        let artifacts = LatestBuildFiles::new().latest(&context).await.unwrap();

        let keys: Vec<_> = artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "main/latest/index.html",
                "main/latest/js/app.js",
                "main/v3/index.html",
                "main/v3/js/app.js",
            ]
        );
        assert_eq!(&artifacts[1].content[..], b"app");
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        write(work.path(), "build/main/v3/index.html", "index");

        let context = BuildContext::new(work.path(), BuildMetadata::new("main", "v3")).unwrap();
        let err = LatestBuildFiles::new().latest(&context).await.unwrap_err();
        assert!(err.to_string().contains("no build output"));
    }
}
