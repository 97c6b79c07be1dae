//! Remote file system core: read-only file systems over HTTP style backends.
//!
//! This crate holds the transport-agnostic part:
//! - `PathValue`: path algebra bound to a mounted file system
//! - `FileAttributes`: directory or regular file, with deferred metadata
//! - `Walker` / `ConnectionBuilder`: the capabilities a backend provides
//! - `RangeByteChannel` / `BulkTransferChannel`: seekable and chunked reads
//! - `MountedFileSystem` / `ProviderRegistry`: mount lifecycle per scheme
//!
//! No sockets are opened here. A backend crate supplies a `ConnectionBuilder`
//! and a `WalkerFactory`.
//!
//! # Example
//!
//! ```rust,no_run
//! use remotefs_core::{ProviderRegistry, Result};
//!
//! fn head(registry: &ProviderRegistry) -> Result<Vec<u8>> {
//!     let path = registry.path("vfs:/data:/a/b.bin")?;
//!     let mut channel = registry.new_byte_channel(&path, &[], &[])?;
//!     let mut buf = vec![0u8; 16];
//!     let n = channel.read(&mut buf)?;
//!     buf.truncate(n);
//!     Ok(buf)
//! }
//! ```

mod attributes;
mod bulk;
mod channel;
mod config;
mod connection;
mod error;
mod filesystem;
mod options;
mod path;
mod registry;
mod walker;

#[cfg(test)]
mod test_support;

pub use attributes::{FileAttributes, FileKind, MetadataSource, RegularFileAttributes, RegularFileMetadata};
pub use bulk::{BulkTransferChannel, DEFAULT_TRANSFER_CHUNK};
pub use channel::RangeByteChannel;
pub use config::{ConnectionConfig, RegistryConfig, DEFAULT_SEPARATOR};
pub use connection::{
    content_range_total, header_map, open_checked, open_ranged, range_value, Connection,
    ConnectionBuilder,
};
pub use error::{Error, Result};
pub use filesystem::MountedFileSystem;
pub use options::{check_read_only_open, AccessMode, CreationAttribute, OpenOption};
pub use path::PathValue;
pub use registry::ProviderRegistry;
pub use walker::{Walker, WalkerFactory};
