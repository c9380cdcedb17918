//! File system utilities for staging and publishing builds.
//!
//! Provides idempotent directory operations and a recursive copy that
//! preserves symlinks.

use anyhow::Context;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> anyhow::Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }

    // create_dir_all is already idempotent - succeeds even if dir exists
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("creating {}", path.display()))
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a directory.
#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Replaces `to` with a recursive copy of `from`.
///
/// Any existing content at `to` is removed first, so files deleted from the
/// build do not linger in the published directory.
pub async fn replace_dir(from: &Path, to: &Path) -> anyhow::Result<()> {
    remove_dir_all(to).await?;
    copy_dir(from, to).await
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks on platforms that support them. Absolute links that
/// point inside `from` are rewritten to the same location inside `to`, so the
/// copy stays valid after `from` is removed.
/// Fails if the source path is not a directory or doesn't exist.
pub async fn copy_dir(from: &Path, to: &Path) -> anyhow::Result<()> {
    if !fs::try_exists(from).await.unwrap_or(false) {
        anyhow::bail!("{} does not exist", from.display());
    }
    if !from.is_dir() {
        anyhow::bail!("{} is not a directory", from.display());
    }

    // Clone paths for move into blocking closure
    let from = from.to_path_buf();
    let to = to.to_path_buf();

    // Offload blocking work to dedicated thread pool
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let canonical_from = std::fs::canonicalize(&from)
            .with_context(|| format!("resolving {}", from.display()))?;

        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        for entry in walkdir::WalkDir::new(&from) {
            let entry = entry?;
            let rel_path = entry.path().strip_prefix(&from)?;
            let dest_path = to.join(rel_path);

            if entry.file_type().is_symlink() {
                let target = std::fs::read_link(entry.path())?;
                let target = relink(&target, &[from.as_path(), canonical_from.as_path()], &to);
                if entry.path().is_dir() {
                    symlink_dir(&target, &dest_path)?;
                } else {
                    symlink_file(&target, &dest_path)?;
                }
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest_path)
                    .with_context(|| format!("creating {}", dest_path.display()))?;
            } else {
                std::fs::copy(entry.path(), &dest_path).with_context(|| {
                    format!(
                        "copying {} to {}",
                        entry.path().display(),
                        dest_path.display()
                    )
                })?;
            }
        }

        Ok(())
    })
    .await
    .context("directory copy task panicked")?
}

/// Maps an absolute link target under one of `roots` to the same place under
/// `to`. Relative targets are left alone.
fn relink(target: &Path, roots: &[&Path], to: &Path) -> PathBuf {
    if target.is_absolute() {
        for root in roots {
            if let Ok(rel) = target.strip_prefix(root) {
                return to.join(rel);
            }
        }
    }
    target.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_dir_drops_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("staged");
        let to = dir.path().join("out/main/v1");
        std::fs::create_dir_all(from.join("js")).unwrap();
        std::fs::write(from.join("js/app.js"), "new").unwrap();
        std::fs::create_dir_all(&to).unwrap();
        std::fs::write(to.join("stale.js"), "old").unwrap();

        replace_dir(&from, &to).await.unwrap();

        assert_eq!(std::fs::read_to_string(to.join("js/app.js")).unwrap(), "new");
        assert!(!to.join("stale.js").exists());
    }

    #[tokio::test]
    async fn copy_dir_requires_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();

        assert!(copy_dir(&file, &dir.path().join("to")).await.is_err());
        assert!(copy_dir(&dir.path().join("missing"), &dir.path().join("to")).await.is_err());
    }

    #[test]
    fn relink_rewrites_absolute_targets_inside_the_source() {
        let to = Path::new("/out/main/v1");
        let roots = [Path::new("/tmp/delivr-x"), Path::new("/private/tmp/delivr-x")];

        assert_eq!(
            relink(Path::new("/tmp/delivr-x/js/app.js"), &roots, to),
            Path::new("/out/main/v1/js/app.js")
        );
        assert_eq!(
            relink(Path::new("/private/tmp/delivr-x/a"), &roots, to),
            Path::new("/out/main/v1/a")
        );
        assert_eq!(
            relink(Path::new("/usr/share/doc"), &roots, to),
            Path::new("/usr/share/doc")
        );
        assert_eq!(relink(Path::new("../a"), &roots, to), Path::new("../a"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_survives_removal_of_linked_source() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("staged");
        let to = dir.path().join("out/main/v1");
        std::fs::create_dir_all(&from).unwrap();
        std::fs::write(from.join("app.js"), "app").unwrap();
        std::os::unix::fs::symlink(from.join("app.js"), from.join("absolute.js")).unwrap();
        std::os::unix::fs::symlink("app.js", from.join("relative.js")).unwrap();

        copy_dir(&from, &to).await.unwrap();
        std::fs::remove_dir_all(&from).unwrap();

        assert_eq!(std::fs::read_link(to.join("absolute.js")).unwrap(), to.join("app.js"));
        assert_eq!(std::fs::read_to_string(to.join("absolute.js")).unwrap(), "app");
        assert_eq!(std::fs::read_to_string(to.join("relative.js")).unwrap(), "app");
    }

    #[tokio::test]
    async fn remove_dir_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        remove_dir_all(&dir.path().join("missing")).await.unwrap();
    }
}
