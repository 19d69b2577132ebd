use std::path::PathBuf;
use thiserror::Error;

/// The ways a sync can fail for reasons other than I/O or the network. These are returned wrapped
/// in an [`anyhow::Error`], so use `downcast_ref::<SyncError>()` to inspect them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The release tag, minus its leading `v`, is not of the form `X.Y.Z`.
    #[error("the release tag `{tag}` is not a version of the form X.Y.Z")]
    InvalidVersion { tag: String },

    /// None of the release's assets has `zip` in its name.
    #[error("could not find a release asset with `zip` in its name from [{names}]")]
    NoMatchingAsset { names: String },

    /// The picked asset's name does not contain the release version.
    #[error("the release version {version} does not appear in the asset name `{asset}`")]
    VersionMismatch { version: String, asset: String },

    /// The asset name cannot be used as a file name in the download directory.
    #[error("refusing to save the asset `{name}` because it is not a plain file name")]
    UnsafeAssetName { name: String },

    /// The downloaded file is not a usable zip archive.
    #[error("the downloaded file at {} is not a valid zip archive: {reason}", path.display())]
    InvalidArchive { path: PathBuf, reason: String },
}
