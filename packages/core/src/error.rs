//! Error types for the remote file system core.

use std::io;

/// Errors raised by paths, file systems, registries and channels.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The URI scheme is not the one the registry serves.
    #[error("the provider scheme '{expected}' is not the same as the uri scheme '{actual}'")]
    SchemeMismatch { expected: String, actual: String },

    /// No service address is configured for the root.
    #[error("the file system '{root}' with scheme '{scheme}' is not initialized")]
    NotInitialized { scheme: String, root: String },

    #[error("file system already mounted: {root}")]
    AlreadyMounted { root: String },

    #[error("file system not found: {root}")]
    NotFound { root: String },

    #[error("file system is closed")]
    ClosedFileSystem,

    #[error("channel is closed")]
    ChannelClosed,

    /// Writes, links, locks, metadata mutation and unsupported open options.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Transport level failure: bad status, malformed headers, broken connection.
    #[error("{}", format_io_failure(.status, .message))]
    IoFailure { status: Option<u16>, message: String },

    #[error("position {position} is past the end of the file (size {size})")]
    EndOfFile { position: u64, size: u64 },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("not a directory: {path}")]
    NotDirectory { path: String },
}

fn format_io_failure(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("I/O failure (response code {}): {}", status, message),
        None => format!("I/O failure: {}", message),
    }
}

impl Error {
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn io_failure(message: impl Into<String>) -> Self {
        Self::IoFailure {
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::IoFailure {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for the two "used after close" kinds.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ClosedFileSystem | Error::ChannelClosed)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::io_failure(e.to_string())
    }
}

/// Convert to `std::io::Error` so channels can sit behind `Read` and `Seek`.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match &e {
            Error::EndOfFile { .. } => io::ErrorKind::UnexpectedEof,
            Error::Unsupported { .. } => io::ErrorKind::Unsupported,
            Error::NotFound { .. } => io::ErrorKind::NotFound,
            Error::ClosedFileSystem | Error::ChannelClosed => io::ErrorKind::BrokenPipe,
            Error::InvalidPath { .. } => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
