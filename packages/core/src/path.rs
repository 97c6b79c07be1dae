//! Paths inside a mounted file system.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use url::Url;

use crate::attributes::FileAttributes;
use crate::error::{Error, Result};
use crate::filesystem::MountedFileSystem;

const CURRENT_DIRECTORY: &str = ".";
const PARENT_DIRECTORY: &str = "..";

/// A location inside one mounted file system.
///
/// The path text is stored normalized to the file system's separator, with
/// empty segments dropped. An absolute path starts with the mount root, which is
/// also its first segment.
///
/// Attributes are cached on first lookup. Clones share the cache cell, and the
/// cache is never invalidated: obtain a new path to see fresh metadata.
#[derive(Clone)]
pub struct PathValue {
    fs: Arc<MountedFileSystem>,
    absolute: bool,
    text: String,
    names: Vec<String>,
    attributes: Arc<OnceLock<FileAttributes>>,
}

impl PathValue {
    /// Parse path text against a file system.
    ///
    /// # Path Syntax
    ///
    /// - Both `/` and `\` are accepted and rewritten to the file system's separator
    /// - Empty segments are dropped (normalizes `//` and trailing separators)
    /// - The path is absolute when its first segment equals the mount root.
    ///   A plain text prefix is not enough: `data:x/y` is relative on `data:`
    pub fn parse(fs: &Arc<MountedFileSystem>, text: &str) -> PathValue {
        let names = split_names(text, fs.separator());
        let normalized = names.join(fs.separator());
        if normalized == fs.root_name() {
            return Self::root_of(fs);
        }
        let absolute = starts_at_root(&names, fs.root_name());
        Self::from_names(fs, absolute, names, None)
    }

    /// The root path of a file system. Its attributes are always a directory.
    pub fn root_of(fs: &Arc<MountedFileSystem>) -> PathValue {
        let root = fs.root_name().to_string();
        let attributes = FileAttributes::directory(root.clone());
        Self::from_names(fs, true, vec![root], Some(attributes))
    }

    /// Build a path from a walker entry, keeping its attributes cached.
    pub fn from_attributes(
        fs: &Arc<MountedFileSystem>,
        attributes: FileAttributes,
    ) -> Result<PathValue> {
        let names = split_names(attributes.file_key(), fs.separator());
        let normalized = names.join(fs.separator());
        if normalized == fs.root_name() {
            if attributes.is_directory() {
                return Ok(Self::root_of(fs));
            }
            return Err(Error::invalid_path(
                normalized,
                "the file system root must be a directory",
            ));
        }
        let absolute = starts_at_root(&names, fs.root_name());
        Ok(Self::from_names(fs, absolute, names, Some(attributes)))
    }

    fn from_names(
        fs: &Arc<MountedFileSystem>,
        absolute: bool,
        names: Vec<String>,
        attributes: Option<FileAttributes>,
    ) -> PathValue {
        let cell = OnceLock::new();
        if let Some(attributes) = attributes {
            let _ = cell.set(attributes);
        }
        PathValue {
            fs: Arc::clone(fs),
            absolute,
            text: names.join(fs.separator()),
            names,
            attributes: Arc::new(cell),
        }
    }

    pub fn file_system(&self) -> &Arc<MountedFileSystem> {
        &self.fs
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[String] {
        &self.names
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// The segment at `index` as a relative single-segment path.
    pub fn name(&self, index: usize) -> Option<PathValue> {
        self.names
            .get(index)
            .map(|name| Self::from_names(&self.fs, false, vec![name.clone()], None))
    }

    /// Iterate over segments as single-segment paths.
    pub fn iter(&self) -> impl Iterator<Item = PathValue> + '_ {
        (0..self.names.len()).filter_map(move |i| self.name(i))
    }

    pub fn root(&self) -> Option<PathValue> {
        self.absolute.then(|| Self::root_of(&self.fs))
    }

    pub fn file_name(&self) -> Option<PathValue> {
        self.names.len().checked_sub(1).and_then(|last| self.name(last))
    }

    /// All but the last segment. `None` for paths with at most one segment.
    pub fn parent(&self) -> Option<PathValue> {
        if self.names.len() <= 1 {
            return None;
        }
        Some(self.slice(0, self.names.len() - 1))
    }

    /// Segments `begin..end`; absolute only when it starts at position 0 of an
    /// absolute path.
    pub fn subpath(&self, begin: usize, end: usize) -> Result<PathValue> {
        if begin > end || end > self.names.len() {
            return Err(Error::invalid_path(
                &self.text,
                format!(
                    "subpath {}..{} out of range for {} segments",
                    begin,
                    end,
                    self.names.len()
                ),
            ));
        }
        Ok(self.slice(begin, end))
    }

    fn slice(&self, begin: usize, end: usize) -> PathValue {
        Self::from_names(
            &self.fs,
            begin == 0 && self.absolute,
            self.names[begin..end].to_vec(),
            None,
        )
    }

    /// Segment-wise prefix test.
    pub fn starts_with(&self, other: &PathValue) -> bool {
        self.absolute == other.absolute && self.names.starts_with(&other.names)
    }

    /// Segment-wise suffix test. An absolute `other` must match the whole path.
    pub fn ends_with(&self, other: &PathValue) -> bool {
        if other.absolute {
            return self.absolute && self.names == other.names;
        }
        if other.names.is_empty() {
            return self.names.is_empty();
        }
        self.names.ends_with(&other.names)
    }

    /// Join `other` onto this path.
    ///
    /// An absolute `other` is returned unchanged; an empty `other` returns
    /// `self`.
    pub fn resolve(&self, other: &PathValue) -> PathValue {
        if other.is_empty() {
            return self.clone();
        }
        if other.absolute {
            return other.clone();
        }
        let joined = format!("{}{}{}", self.text, self.fs.separator(), other.text);
        Self::parse(&self.fs, &joined)
    }

    pub fn resolve_str(&self, other: &str) -> PathValue {
        self.resolve(&Self::parse(&self.fs, other))
    }

    /// Resolve `other` against this path's parent.
    pub fn resolve_sibling(&self, other: &PathValue) -> PathValue {
        if other.is_empty() {
            return self.clone();
        }
        match self.parent() {
            Some(parent) if !other.absolute => parent.resolve(other),
            _ => other.clone(),
        }
    }

    pub fn resolve_sibling_str(&self, other: &str) -> PathValue {
        self.resolve_sibling(&Self::parse(&self.fs, other))
    }

    /// The relative path leading from this path to `other`.
    ///
    /// Both paths must share absoluteness. Segments of `self` past the common
    /// prefix become `..`.
    pub fn relativize(&self, other: &PathValue) -> Result<PathValue> {
        if self.absolute != other.absolute {
            return Err(Error::invalid_path(
                &other.text,
                format!(
                    "cannot relativize against '{}': only one of the paths is absolute",
                    self.text
                ),
            ));
        }
        let common = self
            .names
            .iter()
            .zip(other.names.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let names = std::iter::repeat(PARENT_DIRECTORY.to_string())
            .take(self.names.len() - common)
            .chain(other.names[common..].iter().cloned())
            .collect();
        Ok(Self::from_names(&self.fs, false, names, None))
    }

    /// Remove `.` segments and cancel each `..` with the segment before it.
    ///
    /// A `..` with nothing before it, or one that would cancel the mount root,
    /// is an error: there is no current directory to fall back on.
    pub fn normalize(&self) -> Result<PathValue> {
        let mut frames: Vec<&str> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            match name.as_str() {
                CURRENT_DIRECTORY => {}
                PARENT_DIRECTORY => {
                    if frames.is_empty() {
                        return Err(Error::invalid_path(
                            &self.text,
                            "'..' cannot be on the first position",
                        ));
                    }
                    if self.absolute && frames.len() == 1 {
                        return Err(Error::invalid_path(&self.text, "'..' escapes the root"));
                    }
                    frames.pop();
                }
                other => frames.push(other),
            }
        }
        Ok(Self::parse(&self.fs, &frames.join(self.fs.separator())))
    }

    /// Segment-wise lexicographic order; a strict prefix sorts first.
    pub fn compare_to(&self, other: &PathValue) -> Ordering {
        self.names.cmp(&other.names)
    }

    /// `<scheme>:<path>`, accepted back by `ProviderRegistry::path`.
    pub fn to_uri(&self) -> String {
        format!("{}:{}", self.fs.scheme(), self.text)
    }

    /// There is no working directory, so only absolute paths qualify.
    pub fn to_absolute_path(&self) -> Result<PathValue> {
        if self.absolute {
            Ok(self.clone())
        } else {
            Err(Error::invalid_path(
                &self.text,
                "cannot be converted to an absolute path",
            ))
        }
    }

    /// URL of the remote resource behind this path.
    ///
    /// A source URL carried by resolved attributes wins; otherwise the path
    /// below the root is appended to the configured service address.
    pub fn build_url(&self) -> Result<Url> {
        let url_text = match self
            .cached_attributes()
            .and_then(FileAttributes::resolved_source_url)
        {
            Some(url) => url,
            None => {
                let separator = self.fs.separator();
                let below_root = self
                    .text
                    .strip_prefix(self.fs.root_name())
                    .unwrap_or(&self.text);
                let segments: Vec<&str> = below_root
                    .split(separator)
                    .filter(|s| !s.is_empty())
                    .collect();
                format!(
                    "{}/{}",
                    self.fs.service_address().trim_end_matches('/'),
                    segments.join("/")
                )
            }
        };
        Url::parse(&url_text).map_err(|e| {
            Error::invalid_path(
                &self.text,
                format!("cannot build a url from '{}': {}", url_text, e),
            )
        })
    }

    /// Attributes of this entry, fetched through the file system's walker on
    /// first use and cached afterwards.
    ///
    /// May block on network I/O.
    pub fn attributes(&self) -> Result<FileAttributes> {
        if let Some(attributes) = self.attributes.get() {
            return Ok(attributes.clone());
        }
        let walker = self.fs.walker()?;
        let fetched = walker.attributes_of(self)?;
        Ok(self.attributes.get_or_init(|| fetched).clone())
    }

    /// Cached attributes, without any I/O.
    pub fn cached_attributes(&self) -> Option<&FileAttributes> {
        self.attributes.get()
    }
}

fn starts_at_root(names: &[String], root: &str) -> bool {
    names.first().is_some_and(|first| first == root)
}

fn split_names(text: &str, separator: &str) -> Vec<String> {
    text.replace('\\', separator)
        .replace('/', separator)
        .split(separator)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl fmt::Debug for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathValue")
            .field("root", &self.fs.root_name())
            .field("absolute", &self.absolute)
            .field("path", &self.text)
            .finish()
    }
}

impl PartialEq for PathValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fs, &other.fs) && self.absolute == other.absolute && self.text == other.text
    }
}

impl Eq for PathValue {}

impl Hash for PathValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute.hash(state);
        self.text.hash(state);
    }
}

/// Paths of different file systems are unordered.
impl PartialOrd for PathValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !Arc::ptr_eq(&self.fs, &other.fs) {
            return None;
        }
        Some(
            self.compare_to(other)
                .then(self.absolute.cmp(&other.absolute)),
        )
    }
}

impl std::ops::Index<usize> for PathValue {
    type Output = str;

    fn index(&self, i: usize) -> &Self::Output {
        &self.names[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, ROOT};

    fn parse(text: &str) -> PathValue {
        PathValue::parse(&fixture().fs(), text)
    }

    #[test]
    fn parse_absolute_and_relative() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b.bin");
        assert!(p.is_absolute());
        assert_eq!(p.name_count(), 3);
        assert_eq!(&p[0], ROOT);
        assert_eq!(&p[2], "b.bin");

        let q = PathValue::parse(&fs, "a/b.bin");
        assert!(!q.is_absolute());
        assert_eq!(q.name_count(), 2);

        let glued = PathValue::parse(&fs, "data:x/y");
        assert!(!glued.is_absolute());
        assert_eq!(&glued[0], "data:x");
    }

    #[test]
    fn parse_normalizes_separators() {
        let fs = fixture().fs();
        assert_eq!(
            PathValue::parse(&fs, "data:\\a\\b"),
            PathValue::parse(&fs, "data:/a/b")
        );
        assert_eq!(
            PathValue::parse(&fs, "data:/a/b/"),
            PathValue::parse(&fs, "data:/a/b")
        );
        assert_eq!(PathValue::parse(&fs, "data:/a//b").as_str(), "data:/a/b");
    }

    #[test]
    fn root_parses_to_root() {
        let fs = fixture().fs();
        let root = PathValue::parse(&fs, "data:/");
        assert_eq!(root, PathValue::root_of(&fs));
        assert!(root.cached_attributes().unwrap().is_directory());
        assert!(root.parent().is_none());
    }

    #[test]
    fn round_trip_through_display() {
        let fs = fixture().fs();
        for text in ["data:", "data:/a", "data:/a/b.bin", "data:/x y/z"] {
            let p = PathValue::parse(&fs, text);
            assert_eq!(PathValue::parse(&fs, &p.to_string()), p);
        }
    }

    #[test]
    fn paths_of_different_mounts_differ() {
        let a = fixture();
        let b = fixture();
        let p = PathValue::parse(&a.fs(), "data:/a");
        let q = PathValue::parse(&b.fs(), "data:/a");
        assert_ne!(p, q);
        assert_eq!(p.partial_cmp(&q), None);
    }

    #[test]
    fn resolve_rules() {
        let fs = fixture().fs();
        let base = PathValue::parse(&fs, "data:/a");
        let rel = PathValue::parse(&fs, "b/c.bin");
        assert_eq!(base.resolve(&rel).as_str(), "data:/a/b/c.bin");
        assert!(base.resolve(&rel).is_absolute());

        let abs = PathValue::parse(&fs, "data:/z");
        assert_eq!(base.resolve(&abs), abs);

        let empty = PathValue::parse(&fs, "");
        assert_eq!(base.resolve(&empty), base);
        assert_eq!(base.resolve_str("x").as_str(), "data:/a/x");
    }

    #[test]
    fn resolve_sibling_rules() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b.bin");
        assert_eq!(p.resolve_sibling_str("c.bin").as_str(), "data:/a/c.bin");

        let single = PathValue::parse(&fs, "x");
        assert_eq!(single.resolve_sibling_str("y").as_str(), "y");

        let abs = PathValue::parse(&fs, "data:/q");
        assert_eq!(p.resolve_sibling(&abs), abs);
        assert_eq!(p.resolve_sibling_str(""), p);
    }

    #[test]
    fn relativize_is_inverse_of_resolve() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b");
        for q in ["c", "c/d.bin", "x/y/z"] {
            let q = PathValue::parse(&fs, q);
            assert_eq!(p.relativize(&p.resolve(&q)).unwrap(), q);
        }
        assert!(p.relativize(&p).unwrap().is_empty());
    }

    #[test]
    fn relativize_diverging_paths() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b");
        let q = PathValue::parse(&fs, "data:/a/c/d");
        let r = p.relativize(&q).unwrap();
        assert_eq!(r.as_str(), "../c/d");
        assert_eq!(p.resolve(&r).normalize().unwrap(), q);
    }

    #[test]
    fn relativize_requires_same_absoluteness() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a");
        let q = PathValue::parse(&fs, "a");
        assert!(matches!(p.relativize(&q), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn normalize_rules() {
        assert_eq!(parse("data:/a/./b/../c").normalize().unwrap().as_str(), "data:/a/c");
        assert_eq!(parse("a/b/..").normalize().unwrap().as_str(), "a");
        assert!(parse("a/..").normalize().unwrap().is_empty());
        assert!(matches!(
            parse("../a").normalize(),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            parse("data:/..").normalize(),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn normalize_is_idempotent() {
        for text in ["data:/a/./b/../c", "a/b/c/../..", "./x", "data:", ""] {
            let once = parse(text).normalize().unwrap();
            assert_eq!(once.normalize().unwrap(), once);
        }
    }

    #[test]
    fn compare_orders_prefix_first() {
        let fs = fixture().fs();
        let a = PathValue::parse(&fs, "data:/a");
        let ab = PathValue::parse(&fs, "data:/a/b");
        let b = PathValue::parse(&fs, "data:/b");
        assert_eq!(a.compare_to(&ab), Ordering::Less);
        assert_eq!(ab.compare_to(&b), Ordering::Less);
        assert_eq!(b.compare_to(&a), Ordering::Greater);
        assert_eq!(a.compare_to(&a.clone()), Ordering::Equal);
        assert!(a < ab);
    }

    #[test]
    fn parent_and_names() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b.bin");
        let parent = p.parent().unwrap();
        assert_eq!(parent.as_str(), "data:/a");
        assert!(parent.is_absolute());
        assert_eq!(parent.parent().unwrap(), PathValue::root_of(&fs));
        assert_eq!(p.file_name().unwrap().as_str(), "b.bin");
        assert!(!p.file_name().unwrap().is_absolute());
        assert_eq!(
            p.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
            vec!["data:", "a", "b.bin"]
        );
        assert!(PathValue::parse(&fs, "").file_name().is_none());
    }

    #[test]
    fn subpath_absoluteness() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b/c");
        assert!(p.subpath(0, 2).unwrap().is_absolute());
        let tail = p.subpath(1, 4).unwrap();
        assert!(!tail.is_absolute());
        assert_eq!(tail.as_str(), "a/b/c");
        assert!(p.subpath(2, 5).is_err());
    }

    #[test]
    fn starts_and_ends_with_segments() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/ab/c");
        assert!(p.starts_with(&PathValue::parse(&fs, "data:/ab")));
        assert!(!p.starts_with(&PathValue::parse(&fs, "data:/a")));
        assert!(p.ends_with(&PathValue::parse(&fs, "ab/c")));
        assert!(!p.ends_with(&PathValue::parse(&fs, "b/c")));
        assert!(p.ends_with(&p.clone()));
    }

    #[test]
    fn uri_and_absolute_conversion() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b.bin");
        assert_eq!(p.to_uri(), "vfs:data:/a/b.bin");
        assert_eq!(p.to_absolute_path().unwrap(), p);
        assert!(PathValue::parse(&fs, "a").to_absolute_path().is_err());
        assert_eq!(p.root().unwrap(), PathValue::root_of(&fs));
        assert!(PathValue::parse(&fs, "a").root().is_none());
    }

    #[test]
    fn build_url_from_service_address() {
        let fs = fixture().fs();
        let p = PathValue::parse(&fs, "data:/a/b.bin");
        assert_eq!(p.build_url().unwrap().as_str(), "http://host/bucket/a/b.bin");

        let spaced = PathValue::parse(&fs, "data:/x y/z");
        assert_eq!(
            spaced.build_url().unwrap().as_str(),
            "http://host/bucket/x%20y/z"
        );
    }

    #[test]
    fn build_url_prefers_source_url() {
        let fs = fixture().fs();
        let attributes = FileAttributes::regular(
            "data:/a/b.bin",
            crate::RegularFileMetadata::new(10).with_source_url("http://mirror/b.bin"),
        );
        let p = PathValue::from_attributes(&fs, attributes).unwrap();
        assert_eq!(p.build_url().unwrap().as_str(), "http://mirror/b.bin");
    }

    #[test]
    fn attributes_are_cached() {
        let fx = fixture();
        let p = PathValue::parse(&fx.fs(), "data:/a/b.bin");
        let first = p.attributes().unwrap();
        let second = p.attributes().unwrap();
        assert_eq!(first.size().unwrap(), 10);
        assert_eq!(second.size().unwrap(), 10);
        assert_eq!(fx.walker.attribute_calls(), 1);

        // Clones share the cache.
        p.clone().attributes().unwrap();
        assert_eq!(fx.walker.attribute_calls(), 1);
    }

    #[test]
    fn from_attributes_rejects_regular_root() {
        let fs = fixture().fs();
        let attributes = FileAttributes::regular("data:", crate::RegularFileMetadata::new(1));
        assert!(PathValue::from_attributes(&fs, attributes).is_err());
        let root = PathValue::from_attributes(&fs, FileAttributes::directory("data:/")).unwrap();
        assert_eq!(root, PathValue::root_of(&fs));
    }
}
