//! Scheme-level registry of mounted file systems.
//!
//! A registry serves one URI scheme. It owns the connection data of every root
//! it knows about and the set of currently mounted file systems, keyed by root.
//! Registries are plain values handed to whoever needs them; there is no global
//! instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::attributes::FileAttributes;
use crate::bulk::BulkTransferChannel;
use crate::channel::RangeByteChannel;
use crate::config::{ConnectionConfig, RegistryConfig};
use crate::connection::ConnectionBuilder;
use crate::error::{Error, Result};
use crate::filesystem::MountedFileSystem;
use crate::options::{AccessMode, CreationAttribute, OpenOption};
use crate::path::PathValue;
use crate::walker::WalkerFactory;

pub(crate) struct RegistryInner {
    scheme: String,
    connections: Arc<dyn ConnectionBuilder>,
    walkers: Arc<dyn WalkerFactory>,
    roots: RwLock<HashMap<String, ConnectionConfig>>,
    mounted: Mutex<HashMap<String, Arc<MountedFileSystem>>>,
}

impl RegistryInner {
    /// Drop `fs` from the mounted set, unless another instance took its root.
    pub(crate) fn unlink(&self, fs: &MountedFileSystem) {
        let mut mounted = self.mounted.lock().unwrap_or_else(PoisonError::into_inner);
        let is_current = mounted
            .get(fs.root_name())
            .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), fs));
        if is_current {
            mounted.remove(fs.root_name());
            log::debug!("unmounted {}:{}", self.scheme, fs.root_name());
        }
    }
}

/// Mounts, looks up and serves paths for one URI scheme.
///
/// Cloning is cheap; clones share the same mounted set.
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<RegistryInner>,
}

impl ProviderRegistry {
    pub fn new(
        scheme: impl Into<String>,
        connections: Arc<dyn ConnectionBuilder>,
        walkers: Arc<dyn WalkerFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                scheme: scheme.into(),
                connections,
                walkers,
                roots: RwLock::new(HashMap::new()),
                mounted: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A registry with every root of `config` already configured.
    pub fn from_config(
        config: RegistryConfig,
        connections: Arc<dyn ConnectionBuilder>,
        walkers: Arc<dyn WalkerFactory>,
    ) -> Self {
        let registry = Self::new(config.scheme, connections, walkers);
        for (root, connection) in config.roots {
            registry.configure(root, connection);
        }
        registry
    }

    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    /// Set the connection data for `root`, e.g. `data:`.
    ///
    /// File systems already mounted keep the data they were created with.
    pub fn configure(&self, root: impl Into<String>, config: ConnectionConfig) {
        self.inner
            .roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(root.into(), config);
    }

    pub fn service_address(&self, root: &str) -> Option<String> {
        self.inner
            .roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(root)
            .map(|config| config.service_address.clone())
    }

    /// Split `<scheme>:[/]<root>:<rest>` into the root and the path text.
    fn split_uri(&self, uri: &str) -> Result<(String, String)> {
        let (scheme, specific) = uri
            .split_once(':')
            .ok_or_else(|| Error::invalid_path(uri, "missing uri scheme"))?;
        if scheme != self.inner.scheme {
            return Err(Error::SchemeMismatch {
                expected: self.inner.scheme.clone(),
                actual: scheme.to_string(),
            });
        }
        let text = specific.strip_prefix('/').unwrap_or(specific);
        let root = match text.find(':') {
            Some(index) => &text[..=index],
            None => return Err(Error::invalid_path(uri, "missing file system root")),
        };
        Ok((root.to_string(), text.to_string()))
    }

    fn connection_config(&self, root: &str) -> Result<ConnectionConfig> {
        let roots = self.inner.roots.read().unwrap_or_else(PoisonError::into_inner);
        match roots.get(root) {
            Some(config) if config.is_configured() => Ok(config.clone()),
            _ => Err(Error::NotInitialized {
                scheme: self.inner.scheme.clone(),
                root: root.to_string(),
            }),
        }
    }

    fn create(&self, root: &str, config: ConnectionConfig) -> Result<Arc<MountedFileSystem>> {
        let fs = MountedFileSystem::new(
            &self.inner.scheme,
            root,
            config,
            Arc::clone(&self.inner.connections),
            Arc::clone(&self.inner.walkers),
            Arc::downgrade(&self.inner),
        )?;
        log::debug!(
            "mounted {}:{} at {}",
            self.inner.scheme,
            root,
            fs.service_address()
        );
        Ok(fs)
    }

    /// Mount the root named by `uri`.
    ///
    /// `config`, when given, replaces the root's connection data first. Fails
    /// with `AlreadyMounted` if the root is mounted, leaving its stored
    /// connection data untouched.
    pub fn mount(
        &self,
        uri: &str,
        config: Option<ConnectionConfig>,
    ) -> Result<Arc<MountedFileSystem>> {
        let (root, _) = self.split_uri(uri)?;
        let mut mounted = self.inner.mounted.lock().unwrap_or_else(PoisonError::into_inner);
        if mounted.contains_key(&root) {
            return Err(Error::AlreadyMounted { root });
        }
        if let Some(config) = config {
            self.configure(root.clone(), config);
        }
        let config = self.connection_config(&root)?;
        let fs = self.create(&root, config)?;
        mounted.insert(root, Arc::clone(&fs));
        Ok(fs)
    }

    /// The mounted file system for `uri`, mounting it if needed.
    pub fn get_or_mount(&self, uri: &str) -> Result<Arc<MountedFileSystem>> {
        let (root, _) = self.split_uri(uri)?;
        let config = self.connection_config(&root)?;
        let mut mounted = self.inner.mounted.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = mounted.get(&root) {
            return Ok(Arc::clone(existing));
        }
        let fs = self.create(&root, config)?;
        mounted.insert(root, Arc::clone(&fs));
        Ok(fs)
    }

    pub fn lookup(&self, uri: &str) -> Result<Arc<MountedFileSystem>> {
        let (root, _) = self.split_uri(uri)?;
        self.connection_config(&root)?;
        self.inner
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&root)
            .cloned()
            .ok_or(Error::NotFound { root })
    }

    /// Close the file system mounted for `uri`.
    pub fn unmount(&self, uri: &str) -> Result<()> {
        self.lookup(uri)?.close();
        Ok(())
    }

    /// Roots currently mounted, sorted.
    pub fn mounted_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .inner
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        roots.sort();
        roots
    }

    /// Resolve a URI such as `vfs:/data:/a/b.bin` to a path, mounting its root
    /// on demand.
    pub fn path(&self, uri: &str) -> Result<PathValue> {
        let (_, text) = self.split_uri(uri)?;
        let fs = self.get_or_mount(uri)?;
        Ok(PathValue::parse(&fs, &text))
    }

    /// A path on the first mounted file system whose root prefixes `first`.
    pub fn path_if_root_matches(&self, first: &str, more: &[&str]) -> Option<PathValue> {
        let candidates: Vec<Arc<MountedFileSystem>> = self
            .inner
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        candidates
            .iter()
            .find(|fs| first.starts_with(fs.root_name()))
            .and_then(|fs| fs.get_path(first, more).ok())
    }

    fn check_scheme(&self, path: &PathValue) -> Result<()> {
        let scheme = path.file_system().scheme();
        if scheme == self.inner.scheme {
            Ok(())
        } else {
            Err(Error::SchemeMismatch {
                expected: self.inner.scheme.clone(),
                actual: scheme.to_string(),
            })
        }
    }

    pub fn read_attributes(&self, path: &PathValue) -> Result<FileAttributes> {
        self.check_scheme(path)?;
        path.attributes()
    }

    /// Only read access can be granted; the entry must exist.
    ///
    /// Deferred file metadata is resolved here, so a file the server does not
    /// serve fails even when its attributes were produced without a request.
    pub fn check_access(&self, path: &PathValue, modes: &[AccessMode]) -> Result<()> {
        self.check_scheme(path)?;
        if let Some(mode) = modes.iter().find(|mode| **mode != AccessMode::Read) {
            return Err(Error::unsupported(format!("{:?} access to {}", mode, path)));
        }
        path.attributes()?.size().map(|_| ())
    }

    pub fn is_same_file(&self, a: &PathValue, b: &PathValue) -> Result<bool> {
        Ok(a == b)
    }

    pub fn is_hidden(&self, _path: &PathValue) -> Result<bool> {
        Ok(false)
    }

    pub fn new_directory_stream<F>(&self, dir: &PathValue, filter: F) -> Result<Vec<PathValue>>
    where
        F: FnMut(&PathValue) -> Result<bool>,
    {
        self.check_scheme(dir)?;
        dir.file_system().walk(dir, filter)
    }

    pub fn new_byte_channel(
        &self,
        path: &PathValue,
        options: &[OpenOption],
        attrs: &[CreationAttribute],
    ) -> Result<RangeByteChannel> {
        self.check_scheme(path)?;
        path.file_system().open_byte_channel(path, options, attrs)
    }

    pub fn new_file_channel(
        &self,
        path: &PathValue,
        options: &[OpenOption],
        attrs: &[CreationAttribute],
    ) -> Result<BulkTransferChannel> {
        self.new_byte_channel(path, options, attrs)
            .map(BulkTransferChannel::new)
    }

    pub fn create_directory(&self, dir: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("create directory {}", dir)))
    }

    pub fn delete(&self, path: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("delete {}", path)))
    }

    pub fn copy(&self, source: &PathValue, target: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("copy {} to {}", source, target)))
    }

    pub fn move_path(&self, source: &PathValue, target: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("move {} to {}", source, target)))
    }

    pub fn set_attribute(&self, path: &PathValue, name: &str, _value: &str) -> Result<()> {
        Err(Error::unsupported(format!("set attribute '{}' on {}", name, path)))
    }

    pub fn file_store(&self, path: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("file store of {}", path)))
    }

    pub fn create_symbolic_link(&self, link: &PathValue, target: &PathValue) -> Result<()> {
        Err(Error::unsupported(format!("link {} to {}", link, target)))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("scheme", &self.inner.scheme)
            .field("mounted", &self.mounted_roots())
            .finish()
    }
}
