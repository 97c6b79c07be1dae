//! In-memory backends for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use http::{Method, StatusCode};
use url::Url;

use crate::attributes::{FileAttributes, RegularFileMetadata};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionBuilder};
use crate::error::{Error, Result};
use crate::filesystem::MountedFileSystem;
use crate::path::PathValue;
use crate::registry::ProviderRegistry;
use crate::walker::Walker;

pub const SCHEME: &str = "vfs";
pub const ROOT: &str = "data:";
pub const SERVICE: &str = "http://host/bucket";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub method: Method,
    pub range: Option<String>,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Serves byte ranges of in-memory resources keyed by URL.
#[derive(Default)]
pub struct MemoryConnections {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    ignore_range: AtomicBool,
    body_limit: Mutex<Option<usize>>,
    next_serial: AtomicUsize,
    disconnects: Arc<Mutex<Vec<usize>>>,
}

impl MemoryConnections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, url: &str, body: &[u8]) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Answer every request with `200` and the whole body.
    pub fn ignore_range(&self, ignore: bool) {
        self.ignore_range.store(ignore, Ordering::SeqCst);
    }

    /// Cut response bodies short without changing the headers.
    pub fn truncate_bodies_to(&self, limit: Option<usize>) {
        *self.body_limit.lock().unwrap() = limit;
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.lock().unwrap().len()
    }

    /// Serial numbers of disconnected connections, in disconnect order.
    pub fn disconnect_order(&self) -> Vec<usize> {
        self.disconnects.lock().unwrap().clone()
    }

    fn respond(&self, url: &str, range: Option<&str>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut headers = HeaderMap::new();
        let resources = self.resources.lock().unwrap();
        let Some(body) = resources.get(url) else {
            return (StatusCode::NOT_FOUND, headers, Vec::new());
        };
        let len = body.len() as u64;
        let range = match range {
            Some(range) if !self.ignore_range.load(Ordering::SeqCst) => parse_range(range),
            _ => None,
        };
        let Some((start, end)) = range else {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            return (StatusCode::OK, headers, body.clone());
        };
        if start >= len {
            headers.insert(
                CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes */{}", len)).unwrap(),
            );
            return (StatusCode::RANGE_NOT_SATISFIABLE, headers, Vec::new());
        }
        let last = end.unwrap_or(len - 1).min(len - 1);
        let slice = body[start as usize..=last as usize].to_vec();
        headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {}-{}/{}", start, last, len)).unwrap(),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(slice.len() as u64));
        (StatusCode::PARTIAL_CONTENT, headers, slice)
    }
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

impl ConnectionBuilder for MemoryConnections {
    fn build_connection(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Box<dyn Connection>> {
        let range = headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            method: method.clone(),
            range: range.clone(),
            headers: headers.clone(),
        });
        let (status, response_headers, mut body) = self.respond(url.as_str(), range.as_deref());
        if let Some(limit) = *self.body_limit.lock().unwrap() {
            body.truncate(limit);
        }
        Ok(Box::new(MemoryConnection {
            serial: self.next_serial.fetch_add(1, Ordering::SeqCst),
            status,
            headers: response_headers,
            body: Cursor::new(body),
            disconnects: Arc::clone(&self.disconnects),
        }))
    }
}

pub struct MemoryConnection {
    serial: usize,
    status: StatusCode,
    headers: HeaderMap,
    body: Cursor<Vec<u8>>,
    disconnects: Arc<Mutex<Vec<usize>>>,
}

impl Read for MemoryConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl Connection for MemoryConnection {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn disconnect(self: Box<Self>) {
        self.disconnects.lock().unwrap().push(self.serial);
    }
}

/// Answers from a fixed entry table and counts attribute lookups.
#[derive(Default)]
pub struct MemoryWalker {
    entries: Mutex<BTreeMap<String, FileAttributes>>,
    attribute_calls: AtomicUsize,
}

impl MemoryWalker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_entry(&self, attributes: FileAttributes) {
        self.entries
            .lock()
            .unwrap()
            .insert(attributes.file_key().to_string(), attributes);
    }

    pub fn attribute_calls(&self) -> usize {
        self.attribute_calls.load(Ordering::SeqCst)
    }
}

impl Walker for MemoryWalker {
    fn attributes_of(&self, path: &PathValue) -> Result<FileAttributes> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| Error::http_status(404, format!("{}: not found", path)))
    }

    fn list_one_level(&self, dir: &PathValue) -> Result<Vec<FileAttributes>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| {
                entry
                    .file_key()
                    .rsplit_once('/')
                    .is_some_and(|(parent, _)| parent == dir.as_str())
            })
            .cloned()
            .collect())
    }
}

pub struct Fixture {
    pub registry: ProviderRegistry,
    pub connections: Arc<MemoryConnections>,
    pub walker: Arc<MemoryWalker>,
    factory_calls: Arc<AtomicUsize>,
}

impl Fixture {
    /// The mounted `data:` file system, mounting it on first use.
    pub fn fs(&self) -> Arc<MountedFileSystem> {
        self.registry.get_or_mount("vfs:data:").unwrap()
    }

    pub fn factory_calls(&self) -> usize {
        self.factory_calls.load(Ordering::SeqCst)
    }
}

/// Registry for scheme `vfs` with root `data:` served from `http://host/bucket`.
///
/// ```text
/// data:/a            directory
/// data:/a/b.bin      "0123456789"
/// data:/a/c          directory
/// data:/a/c/d.txt    "abc"
/// ```
pub fn fixture() -> Fixture {
    let connections = MemoryConnections::new();
    connections.insert("http://host/bucket/a/b.bin", b"0123456789");
    connections.insert("http://host/bucket/a/c/d.txt", b"abc");

    let walker = MemoryWalker::new();
    walker.add_entry(FileAttributes::directory("data:/a"));
    walker.add_entry(FileAttributes::regular(
        "data:/a/b.bin",
        RegularFileMetadata::new(10),
    ));
    walker.add_entry(FileAttributes::directory("data:/a/c"));
    walker.add_entry(FileAttributes::regular(
        "data:/a/c/d.txt",
        RegularFileMetadata::new(3),
    ));

    let factory_calls = Arc::new(AtomicUsize::new(0));
    let factory = {
        let walker = Arc::clone(&walker);
        let calls = Arc::clone(&factory_calls);
        move |_: &MountedFileSystem| -> Result<Arc<dyn Walker>> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(walker.clone())
        }
    };

    let registry = ProviderRegistry::new(SCHEME, connections.clone(), Arc::new(factory));
    registry.configure(
        ROOT,
        ConnectionConfig::new(SERVICE).with_header("X-Api-Key", "secret"),
    );
    Fixture {
        registry,
        connections,
        walker,
        factory_calls,
    }
}
