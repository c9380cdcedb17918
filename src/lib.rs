//! Branch and version scoped static asset releases.
//!
//! This library stages a local build directory and, when deploying, replaces
//! two prefixes of an object-storage bucket with the built files:
//! - `{branch}/{version}/...` - immutable, cached for a year
//! - `{branch}/latest/...` - movable alias, cached for three hours
//!
//! The build and storage steps are trait seams with default implementations
//! in [`build`] and [`storage`].

pub mod build;
pub mod error;
pub mod release;
pub mod storage;

// Re-export commonly used types
pub use error::{ConfigError, ReleaseError, Result, SyncError};
pub use release::{
    BuildContext, BuildMetadata, Environment, FinalizeOutcome, ReleaseConfig, ReleaseHandle,
    ReleaseOptions, Releaser, ReleaserBuilder, SyncReport, prepare,
};
pub use storage::{Access, StorageClient, StorageError, StorageProvider, UploadPayload};
