//! The directory walking capability consumed by the core.

use std::sync::Arc;

use crate::attributes::FileAttributes;
use crate::error::Result;
use crate::filesystem::MountedFileSystem;
use crate::path::PathValue;

/// Resolves attributes and lists directories against a remote backend.
///
/// Implementations decide how: probing URLs, reading a listing index, or
/// anything else. Transport failures are returned as `Error::IoFailure`.
pub trait Walker: Send + Sync {
    /// Attributes of a single entry.
    ///
    /// Repeated calls for an unchanged remote resource return equal attributes.
    fn attributes_of(&self, path: &PathValue) -> Result<FileAttributes>;

    /// Entries exactly one level below `dir`. Order is unspecified.
    ///
    /// Each entry's key is the full path text of that entry.
    fn list_one_level(&self, dir: &PathValue) -> Result<Vec<FileAttributes>>;
}

/// Creates the walker bound to a mounted file system.
///
/// Called at most once per mount.
pub trait WalkerFactory: Send + Sync {
    fn new_walker(&self, fs: &MountedFileSystem) -> Result<Arc<dyn Walker>>;
}

impl<F> WalkerFactory for F
where
    F: Fn(&MountedFileSystem) -> Result<Arc<dyn Walker>> + Send + Sync,
{
    fn new_walker(&self, fs: &MountedFileSystem) -> Result<Arc<dyn Walker>> {
        self(fs)
    }
}
