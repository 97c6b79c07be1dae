//! One mounted root of a remote file system.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use http::HeaderMap;

use crate::channel::{ChannelShared, RangeByteChannel};
use crate::config::ConnectionConfig;
use crate::connection::{header_map, ConnectionBuilder};
use crate::error::{Error, Result};
use crate::options::{check_read_only_open, CreationAttribute, OpenOption};
use crate::path::PathValue;
use crate::registry::RegistryInner;
use crate::walker::{Walker, WalkerFactory};

/// A read-only file system bound to one root address and backend.
///
/// Created by [`crate::ProviderRegistry`]. Paths hold an `Arc` back to their
/// file system, so it lives as long as any of its paths.
pub struct MountedFileSystem {
    scheme: String,
    root: String,
    config: ConnectionConfig,
    request_headers: HeaderMap,
    connections: Arc<dyn ConnectionBuilder>,
    walker_factory: Arc<dyn WalkerFactory>,
    walker: Mutex<Option<Arc<dyn Walker>>>,
    channels: Mutex<Vec<(u64, Arc<ChannelShared>)>>,
    next_channel_id: AtomicU64,
    closed: AtomicBool,
    registry: Weak<RegistryInner>,
}

impl MountedFileSystem {
    pub(crate) fn new(
        scheme: &str,
        root: &str,
        config: ConnectionConfig,
        connections: Arc<dyn ConnectionBuilder>,
        walker_factory: Arc<dyn WalkerFactory>,
        registry: Weak<RegistryInner>,
    ) -> Result<Arc<Self>> {
        if config.separator.is_empty() {
            return Err(Error::invalid_path(root, "empty path separator"));
        }
        let request_headers = header_map(&config.headers)?;
        Ok(Arc::new(Self {
            scheme: scheme.to_string(),
            root: root.to_string(),
            config,
            request_headers,
            connections,
            walker_factory,
            walker: Mutex::new(None),
            channels: Mutex::new(Vec::new()),
            next_channel_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            registry,
        }))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The root text, e.g. `data:`.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn separator(&self) -> &str {
        &self.config.separator
    }

    pub fn service_address(&self) -> &str {
        &self.config.service_address
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Headers configured for every request against this root.
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionBuilder> {
        &self.connections
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Always true.
    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn root(self: &Arc<Self>) -> PathValue {
        PathValue::root_of(self)
    }

    pub fn root_directories(self: &Arc<Self>) -> Vec<PathValue> {
        vec![self.root()]
    }

    pub fn supported_attribute_views(&self) -> Vec<&'static str> {
        vec!["basic"]
    }

    pub fn new_watch_service(&self) -> Result<()> {
        Err(Error::unsupported("watch service"))
    }

    pub fn open_channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::ClosedFileSystem)
        }
    }

    /// Join `first` and `more` with the separator and parse the result.
    pub fn get_path(self: &Arc<Self>, first: &str, more: &[&str]) -> Result<PathValue> {
        self.ensure_open()?;
        let joined = std::iter::once(first)
            .chain(more.iter().copied())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(self.separator());
        Ok(PathValue::parse(self, &joined))
    }

    /// The walker bound to this mount, created on first use.
    pub fn walker(&self) -> Result<Arc<dyn Walker>> {
        self.ensure_open()?;
        let mut walker = self.walker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = walker.as_ref() {
            return Ok(Arc::clone(existing));
        }
        log::debug!("creating walker for {}:{}", self.scheme, self.root);
        let created = self.walker_factory.new_walker(self)?;
        *walker = Some(Arc::clone(&created));
        Ok(created)
    }

    /// List the entries one level below `dir` that pass `filter`.
    ///
    /// A filter error skips that entry and is logged; it never aborts the
    /// listing. Walker errors are returned.
    pub fn walk<F>(self: &Arc<Self>, dir: &PathValue, mut filter: F) -> Result<Vec<PathValue>>
    where
        F: FnMut(&PathValue) -> Result<bool>,
    {
        self.ensure_open()?;
        if !dir.attributes()?.is_directory() {
            return Err(Error::NotDirectory {
                path: dir.to_string(),
            });
        }
        let walker = self.walker()?;
        let mut entries = Vec::new();
        for attributes in walker.list_one_level(dir)? {
            let key = attributes.file_key().to_string();
            let path = match PathValue::from_attributes(self, attributes) {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("skipping entry '{}' of {}: {}", key, dir, e);
                    continue;
                }
            };
            match filter(&path) {
                Ok(true) => entries.push(path),
                Ok(false) => {}
                Err(e) => log::warn!("skipping entry '{}' of {}: {}", path, dir, e),
            }
        }
        Ok(entries)
    }

    /// Open a seekable read channel.
    ///
    /// Only a plain read is accepted: no options or just `Read`, and no creation
    /// attributes.
    pub fn open_byte_channel(
        self: &Arc<Self>,
        path: &PathValue,
        options: &[OpenOption],
        attrs: &[CreationAttribute],
    ) -> Result<RangeByteChannel> {
        self.ensure_open()?;
        check_read_only_open(options, attrs)?;
        let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);
        let mut channel = RangeByteChannel::open(path.clone(), id)?;
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, channel.shared()));
        // A close that raced the open has already drained the set.
        if !self.is_open() {
            channel.close();
            return Err(Error::ClosedFileSystem);
        }
        Ok(channel)
    }

    pub(crate) fn forget_channel(&self, id: u64) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(channel_id, _)| *channel_id != id);
    }

    /// Close every open channel, newest first, then leave the registry.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let channels =
            std::mem::take(&mut *self.channels.lock().unwrap_or_else(PoisonError::into_inner));
        log::debug!(
            "closing {}:{} with {} open channel(s)",
            self.scheme,
            self.root,
            channels.len()
        );
        for (_, channel) in channels.into_iter().rev() {
            channel.close();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unlink(self);
        }
    }
}

impl fmt::Debug for MountedFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedFileSystem")
            .field("scheme", &self.scheme)
            .field("root", &self.root)
            .field("service_address", &self.config.service_address)
            .field("open", &self.is_open())
            .finish()
    }
}
