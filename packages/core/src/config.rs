//! Connection configuration for mounted roots.
//!
//! Configurations are plain serde types, so a host application can keep them in
//! whatever document it already loads. Example registry document:
//!
//! ```json
//! {
//!   "scheme": "vfs",
//!   "roots": {
//!     "data:": {"service_address": "https://host/bucket"},
//!     "s3:": {"service_address": "https://s3.example.com", "properties": {"bucket": "b"}}
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_SEPARATOR: &str = "/";

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

/// Connection data for one file system root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base address every resource URL is built from. Empty means unconfigured.
    #[serde(default)]
    pub service_address: String,

    /// Separator used by paths of this root.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Headers sent with every request for this root.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Backend specific parameters, handed to the walker factory untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            service_address: String::new(),
            separator: default_separator(),
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(service_address: impl Into<String>) -> Self {
        Self {
            service_address: service_address.into(),
            ..Default::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.service_address.is_empty()
    }
}

/// All roots served under one scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub scheme: String,
    #[serde(default)]
    pub roots: BTreeMap<String, ConnectionConfig>,
}

impl RegistryConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: RegistryConfig = serde_json::from_str(text)
            .map_err(|e| Error::io_failure(format!("invalid registry configuration: {}", e)))?;
        for (root, connection) in &config.roots {
            if connection.separator.is_empty() {
                return Err(Error::invalid_path(root, "empty path separator"));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_missing() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"service_address": "http://host/bucket"}"#).unwrap();
        assert_eq!(config.separator, "/");
        assert!(config.headers.is_empty());
        assert!(config.is_configured());
        assert!(!ConnectionConfig::default().is_configured());
    }

    #[test]
    fn registry_from_json() {
        let config = RegistryConfig::from_json(
            r#"{
                "scheme": "vfs",
                "roots": {
                    "data:": {
                        "service_address": "http://host/bucket",
                        "headers": {"Authorization": "Bearer t"}
                    },
                    "s3:": {"service_address": "", "properties": {"bucket": "b"}}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.scheme, "vfs");
        assert_eq!(config.roots.len(), 2);
        assert_eq!(
            config.roots["data:"].headers.get("Authorization").map(String::as_str),
            Some("Bearer t")
        );
        assert!(!config.roots["s3:"].is_configured());
    }

    #[test]
    fn registry_rejects_empty_separator() {
        let err = RegistryConfig::from_json(
            r#"{"scheme": "vfs", "roots": {"data:": {"service_address": "x", "separator": ""}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn registry_rejects_malformed_json() {
        assert!(matches!(
            RegistryConfig::from_json("{"),
            Err(Error::IoFailure { .. })
        ));
    }

    #[test]
    fn builder_methods() {
        let config = ConnectionConfig::new("http://h")
            .with_separator("\\")
            .with_header("X-Key", "v")
            .with_property("bucket", "b");
        assert_eq!(config.separator, "\\");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.properties["bucket"], "b");
    }
}
