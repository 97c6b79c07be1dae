//! # remotefs-http
//!
//! HTTP backend for the remote file system core.
//!
//! - [`ReqwestConnectionBuilder`] opens connections with a blocking `reqwest`
//!   client.
//! - [`HttpWalker`] resolves attributes and listings against servers that
//!   publish HTML index pages; [`HttpWalkerFactory`] binds one to each mount.
//!
//! ```ignore
//! use std::sync::Arc;
//! use remotefs_core::{ConnectionConfig, ProviderRegistry};
//! use remotefs_http::{HttpWalkerFactory, ReqwestConnectionBuilder};
//!
//! let registry = ProviderRegistry::new(
//!     "vfs",
//!     Arc::new(ReqwestConnectionBuilder::with_default_timeout()?),
//!     Arc::new(HttpWalkerFactory),
//! );
//! registry.configure("data:", ConnectionConfig::new("https://host/bucket"));
//! let entries = registry.new_directory_stream(&registry.path("vfs:/data:/a")?, |_| Ok(true))?;
//! ```

pub mod error;

mod connection;
mod walker;

pub use connection::{ReqwestConnection, ReqwestConnectionBuilder};
pub use error::Error;
pub use walker::{HttpWalker, HttpWalkerFactory};
