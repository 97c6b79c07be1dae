//! File attributes for remote entries.
//!
//! Directories carry no HTTP metadata. Regular files carry a size, an optional
//! last-modified timestamp and an optional source URL, either known up front or
//! produced by a deferred callback that runs at most once successfully.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata of a regular file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegularFileMetadata {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl RegularFileMetadata {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            last_modified: None,
            source_url: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }
}

/// Callback producing metadata on first use.
pub type MetadataSource = Box<dyn Fn() -> Result<RegularFileMetadata> + Send + Sync>;

/// Kind of a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Directory,
    RegularFile,
}

/// Attributes of a remote entry.
///
/// Cloning is cheap and clones share the same metadata cell.
#[derive(Clone)]
pub enum FileAttributes {
    Directory { key: String },
    RegularFile(Arc<RegularFileAttributes>),
}

impl FileAttributes {
    pub fn directory(key: impl Into<String>) -> Self {
        FileAttributes::Directory { key: key.into() }
    }

    /// A regular file whose metadata is already known.
    pub fn regular(key: impl Into<String>, metadata: RegularFileMetadata) -> Self {
        FileAttributes::RegularFile(Arc::new(RegularFileAttributes {
            key: key.into(),
            metadata: Mutex::new(MetadataState::Resolved(metadata)),
        }))
    }

    /// A regular file whose metadata is fetched on first access.
    pub fn deferred<F>(key: impl Into<String>, source: F) -> Self
    where
        F: Fn() -> Result<RegularFileMetadata> + Send + Sync + 'static,
    {
        FileAttributes::RegularFile(Arc::new(RegularFileAttributes {
            key: key.into(),
            metadata: Mutex::new(MetadataState::Deferred(Box::new(source))),
        }))
    }

    /// The identity of the entry: its full path text.
    pub fn file_key(&self) -> &str {
        match self {
            FileAttributes::Directory { key } => key,
            FileAttributes::RegularFile(file) => &file.key,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            FileAttributes::Directory { .. } => FileKind::Directory,
            FileAttributes::RegularFile(_) => FileKind::RegularFile,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileAttributes::Directory { .. })
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self, FileAttributes::RegularFile(_))
    }

    /// Remote entries are never links.
    pub fn is_symbolic_link(&self) -> bool {
        false
    }

    pub fn is_other(&self) -> bool {
        false
    }

    /// Size in bytes. Directories report 0.
    pub fn size(&self) -> Result<u64> {
        match self {
            FileAttributes::Directory { .. } => Ok(0),
            FileAttributes::RegularFile(file) => Ok(file.metadata()?.size),
        }
    }

    pub fn last_modified(&self) -> Result<Option<String>> {
        match self {
            FileAttributes::Directory { .. } => Ok(None),
            FileAttributes::RegularFile(file) => Ok(file.metadata()?.last_modified),
        }
    }

    pub fn source_url(&self) -> Result<Option<String>> {
        match self {
            FileAttributes::Directory { .. } => Ok(None),
            FileAttributes::RegularFile(file) => Ok(file.metadata()?.source_url),
        }
    }

    /// The source URL if metadata is already resolved. Never performs I/O.
    pub fn resolved_source_url(&self) -> Option<String> {
        match self {
            FileAttributes::Directory { .. } => None,
            FileAttributes::RegularFile(file) => file.resolved().and_then(|m| m.source_url),
        }
    }
}

impl fmt::Debug for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAttributes::Directory { key } => {
                f.debug_struct("Directory").field("key", key).finish()
            }
            FileAttributes::RegularFile(file) => f
                .debug_struct("RegularFile")
                .field("key", &file.key)
                .field("metadata", &file.resolved())
                .finish(),
        }
    }
}

/// A regular file's key plus its (possibly deferred) metadata.
pub struct RegularFileAttributes {
    key: String,
    metadata: Mutex<MetadataState>,
}

enum MetadataState {
    Resolved(RegularFileMetadata),
    Deferred(MetadataSource),
}

impl RegularFileAttributes {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resolve the metadata, running the deferred callback if needed.
    ///
    /// The lock is held while the callback runs, so concurrent callers wait for
    /// the single fetch. A failed fetch leaves the callback in place.
    pub fn metadata(&self) -> Result<RegularFileMetadata> {
        let mut state = self.metadata.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            MetadataState::Resolved(metadata) => Ok(metadata.clone()),
            MetadataState::Deferred(source) => {
                let metadata = source()?;
                *state = MetadataState::Resolved(metadata.clone());
                Ok(metadata)
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }

    fn resolved(&self) -> Option<RegularFileMetadata> {
        let state = self.metadata.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            MetadataState::Resolved(metadata) => Some(metadata.clone()),
            MetadataState::Deferred(_) => None,
        }
    }
}
