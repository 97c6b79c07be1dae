//! remotefs: read-only virtual file systems over HTTP and object storage.
//!
//! Remote resources are mounted per root under a URI scheme and read through
//! paths and seekable channels. Everything blocks on network I/O; there is no
//! background work.
//!
//! ```ignore
//! let registry = remotefs::http_registry("vfs")?;
//! registry.configure("data:", remotefs::ConnectionConfig::new("https://host/bucket"));
//! let path = registry.path("vfs:/data:/a/b.bin")?;
//! let mut channel = registry.new_byte_channel(&path, &[], &[])?;
//! ```

use std::sync::Arc;

pub use remotefs_core::*;

pub mod http {
    pub use remotefs_http::*;
}

use remotefs_http::{HttpWalkerFactory, ReqwestConnectionBuilder};

/// A registry for `scheme` backed by plain HTTP with the default timeout.
pub fn http_registry(scheme: &str) -> Result<ProviderRegistry> {
    let connections = ReqwestConnectionBuilder::with_default_timeout()?;
    Ok(ProviderRegistry::new(
        scheme,
        Arc::new(connections),
        Arc::new(HttpWalkerFactory),
    ))
}

/// An HTTP-backed registry with the roots of a JSON registry document.
pub fn http_registry_from_json(text: &str) -> Result<ProviderRegistry> {
    let config = RegistryConfig::from_json(text)?;
    let connections = ReqwestConnectionBuilder::with_default_timeout()?;
    Ok(ProviderRegistry::from_config(
        config,
        Arc::new(connections),
        Arc::new(HttpWalkerFactory),
    ))
}
