//! Walker for plain HTTP servers that publish HTML index pages.
//!
//! A path is a directory when `<url>/` answers with a success status. Listings
//! are read from the `href` targets of that index page. Regular files get their
//! metadata from a deferred GET, so listing a directory costs one request.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use http::header::{HeaderMap, LAST_MODIFIED};
use http::Method;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use remotefs_core::{
    open_checked, ConnectionBuilder, FileAttributes, MountedFileSystem, PathValue,
    RegularFileMetadata, Walker, WalkerFactory,
};

use crate::error::Error;

lazy_static! {
    static ref HREF: Regex = Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap();
}

/// Resolves entries of one mounted file system over HTTP.
pub struct HttpWalker {
    root: String,
    separator: String,
    connections: Arc<dyn ConnectionBuilder>,
    headers: HeaderMap,
}

impl HttpWalker {
    pub fn new(fs: &MountedFileSystem) -> Self {
        Self {
            root: fs.root_name().to_string(),
            separator: fs.separator().to_string(),
            connections: Arc::clone(fs.connections()),
            headers: fs.request_headers().clone(),
        }
    }

    fn is_root(&self, path: &PathValue) -> bool {
        path.is_absolute() && path.name_count() == 1
    }

    fn entry_url(&self, path: &PathValue) -> remotefs_core::Result<Url> {
        if !path.is_absolute() {
            return Err(remotefs_core::Error::invalid_path(
                path.as_str(),
                format!("only paths below '{}' can be resolved", self.root),
            ));
        }
        path.build_url()
    }

    fn regular_file(&self, key: String, url: Url) -> FileAttributes {
        let connections = Arc::clone(&self.connections);
        let headers = self.headers.clone();
        FileAttributes::deferred(key, move || {
            fetch_metadata(connections.as_ref(), &url, &headers)
        })
    }

    fn fetch_index(&self, url: &Url) -> remotefs_core::Result<String> {
        let mut connection =
            open_checked(self.connections.as_ref(), url, &Method::GET, &self.headers)?;
        let mut bytes = Vec::new();
        let read = connection.read_to_end(&mut bytes);
        connection.disconnect();
        read?;
        String::from_utf8(bytes).map_err(|_| {
            Error::Listing {
                url: url.to_string(),
                message: "body is not UTF-8".to_string(),
            }
            .into()
        })
    }
}

/// `url` with exactly one trailing `/`.
fn directory_url(url: &Url) -> Url {
    let mut directory = url.clone();
    if !directory.path().ends_with('/') {
        let path = format!("{}/", directory.path());
        directory.set_path(&path);
    }
    directory
}

/// GET the resource and read its length and modification time.
fn fetch_metadata(
    connections: &dyn ConnectionBuilder,
    url: &Url,
    headers: &HeaderMap,
) -> remotefs_core::Result<RegularFileMetadata> {
    let connection = open_checked(connections, url, &Method::GET, headers)?;
    let size = connection.content_length();
    let last_modified = connection
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    connection.disconnect();

    let size = size.ok_or_else(|| {
        remotefs_core::Error::io_failure(format!("{}: missing Content-Length", url))
    })?;
    let mut metadata = RegularFileMetadata::new(size).with_source_url(url.as_str());
    metadata.last_modified = last_modified;
    Ok(metadata)
}

/// An `href` target one level below the listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexEntry {
    name: String,
    is_directory: bool,
    url: Url,
}

/// Entries one level below `directory`, sorted by decoded name.
///
/// Parent, self, query and fragment links are dropped, and so is anything
/// outside `directory`. Names that decode to a path separator are dropped too.
fn index_entries(directory: &Url, page: &str) -> Vec<IndexEntry> {
    let mut entries = BTreeMap::new();
    for capture in HREF.captures_iter(page) {
        let href = &capture[1];
        if href.is_empty() || href.contains('?') || href.contains('#') {
            continue;
        }
        let Ok(target) = directory.join(href) else {
            continue;
        };
        let Some(rest) = target.as_str().strip_prefix(directory.as_str()) else {
            continue;
        };
        let is_directory = rest.ends_with('/');
        let name = rest.trim_end_matches('/');
        if name.is_empty() || name.contains('/') {
            continue;
        }
        let decoded = percent_decode_str(name).decode_utf8_lossy().into_owned();
        if decoded == "." || decoded == ".." {
            continue;
        }
        if decoded.contains(['/', '\\']) {
            log::warn!(
                "{}: skipping entry '{}' with an encoded separator",
                directory,
                decoded
            );
            continue;
        }
        entries.entry(decoded.clone()).or_insert(IndexEntry {
            name: decoded,
            is_directory,
            url: target,
        });
    }
    entries.into_values().collect()
}

impl Walker for HttpWalker {
    fn attributes_of(&self, path: &PathValue) -> remotefs_core::Result<FileAttributes> {
        if self.is_root(path) {
            return Ok(FileAttributes::directory(path.as_str()));
        }
        let url = self.entry_url(path)?;
        let probe = self.connections.build_connection(
            &directory_url(&url),
            &Method::GET,
            &self.headers,
        )?;
        let is_directory = probe.status().is_success();
        probe.disconnect();
        if is_directory {
            Ok(FileAttributes::directory(path.as_str()))
        } else {
            Ok(self.regular_file(path.as_str().to_string(), url))
        }
    }

    fn list_one_level(&self, dir: &PathValue) -> remotefs_core::Result<Vec<FileAttributes>> {
        let url = directory_url(&self.entry_url(dir)?);
        let page = self.fetch_index(&url)?;
        let entries = index_entries(&url, &page);
        log::debug!("{} lists {} entries", url, entries.len());

        let mut listed = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name.contains(self.separator.as_str()) {
                log::warn!(
                    "{}: skipping entry '{}' containing '{}'",
                    url,
                    entry.name,
                    self.separator
                );
                continue;
            }
            let key = format!("{}{}{}", dir.as_str(), self.separator, entry.name);
            if entry.is_directory {
                listed.push(FileAttributes::directory(key));
            } else {
                listed.push(self.regular_file(key, entry.url));
            }
        }
        Ok(listed)
    }
}

/// Creates one [`HttpWalker`] per mounted file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpWalkerFactory;

impl WalkerFactory for HttpWalkerFactory {
    fn new_walker(&self, fs: &MountedFileSystem) -> remotefs_core::Result<Arc<dyn Walker>> {
        log::debug!("new HTTP walker for {}:{}", fs.scheme(), fs.root_name());
        Ok(Arc::new(HttpWalker::new(fs)))
    }
}
