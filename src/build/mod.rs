//! Default build collaborators.
//!
//! - [`GitBuildData`] - branch and version from options or git
//! - [`TempBuildDir`] - temp-directory staging, published to `build/` on finalize
//! - [`LatestBuildFiles`] - enumerates the published version and latest trees
//!
//! The three agree on the `{cwd}/build/{branch}/{version|latest}` layout;
//! when changing the output directory, change it on both the stager and the
//! enumerator.

mod data;
mod dir;
mod files;
pub mod fs;

pub use data::GitBuildData;
pub use dir::{DEFAULT_OUTPUT_DIR, StagedBuildDir, TempBuildDir};
pub use files::LatestBuildFiles;
