//! In-memory store for embedded asset bundles

use super::{clean_segments, is_a_directory, not_a_directory, FileStore, Metadata, StoreFile};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    Dir,
}

/// A bundle of files held in memory
///
/// Keys are cleaned relative paths (`""` is the root). Parent directories
/// are created implicitly when a file is inserted. Every entry shares one
/// optional modification time; bundles compiled into a binary usually have
/// none, in which case no `Last-Modified` header is produced.
#[derive(Debug, Clone)]
pub struct EmbeddedStore {
    nodes: BTreeMap<String, Node>,
    modified: Option<SystemTime>,
}

impl Default for EmbeddedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedStore {
    /// Create a store holding only the root directory
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::Dir);
        Self {
            nodes,
            modified: None,
        }
    }

    /// Builder-style [`insert_file`](Self::insert_file)
    pub fn with_file(mut self, path: &str, contents: impl Into<Bytes>) -> Self {
        self.insert_file(path, contents);
        self
    }

    /// Builder-style [`insert_dir`](Self::insert_dir)
    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert_dir(path);
        self
    }

    /// Stamp every entry with `modified`
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Add a file, creating its parent directories
    pub fn insert_file(&mut self, path: &str, contents: impl Into<Bytes>) {
        let segments = clean_segments(path);
        let Some((_, parents)) = segments.split_last() else {
            tracing::warn!("Ignoring embedded file with empty path {:?}", path);
            return;
        };
        self.insert_parents(parents);
        self.nodes.insert(segments.join("/"), Node::File(contents.into()));
    }

    /// Add an (empty) directory, creating its parents
    pub fn insert_dir(&mut self, path: &str) {
        let segments = clean_segments(path);
        self.insert_parents(&segments);
    }

    fn insert_parents(&mut self, segments: &[&str]) {
        for depth in 1..=segments.len() {
            let key = segments[..depth].join("/");
            let node = self.nodes.entry(key).or_insert(Node::Dir);
            if let Node::File(_) = node {
                tracing::warn!("Embedded path {:?} replaced by a directory", segments[..depth].join("/"));
                *node = Node::Dir;
            }
        }
    }

    /// Number of files in the bundle
    pub fn file_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, Node::File(_)))
            .count()
    }

    fn metadata_for(&self, key: &str, node: &Node) -> Metadata {
        let name = key.rsplit('/').next().unwrap_or_default().to_string();
        match node {
            Node::File(data) => Metadata {
                name,
                is_dir: false,
                size: data.len() as u64,
                modified: self.modified,
            },
            Node::Dir => Metadata {
                name,
                is_dir: true,
                size: 0,
                modified: self.modified,
            },
        }
    }

    fn children(&self, key: &str) -> Vec<Metadata> {
        self.nodes
            .iter()
            .filter(|(k, _)| !k.is_empty() && parent_of(k) == key)
            .map(|(k, node)| self.metadata_for(k, node))
            .collect()
    }
}

fn parent_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[cfg(feature = "include-dir")]
impl EmbeddedStore {
    /// Build a store from a directory embedded with `include_dir!`
    pub fn from_include_dir(dir: &include_dir::Dir<'static>) -> Self {
        let mut store = Self::new();
        store.add_include_dir(dir);
        store
    }

    fn add_include_dir(&mut self, dir: &include_dir::Dir<'static>) {
        for entry in dir.entries() {
            match entry {
                include_dir::DirEntry::Dir(sub) => {
                    self.insert_dir(&sub.path().to_string_lossy().replace('\\', "/"));
                    self.add_include_dir(sub);
                }
                include_dir::DirEntry::File(file) => {
                    let path = file.path().to_string_lossy().replace('\\', "/");
                    self.insert_file(&path, Bytes::from_static(file.contents()));
                }
            }
        }
    }
}

#[async_trait]
impl FileStore for EmbeddedStore {
    async fn open(&self, path: &str) -> io::Result<Box<dyn StoreFile>> {
        let key = clean_segments(path).join("/");
        let node = self.nodes.get(&key).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} is not embedded", path))
        })?;

        let meta = self.metadata_for(&key, node);
        let file = match node {
            Node::File(data) => EmbeddedFile {
                meta,
                cursor: Cursor::new(data.clone()),
                children: None,
            },
            Node::Dir => EmbeddedFile {
                meta,
                cursor: Cursor::new(Bytes::new()),
                children: Some(self.children(&key)),
            },
        };
        Ok(Box::new(file))
    }
}

/// An entry opened from an [`EmbeddedStore`]
#[derive(Debug)]
pub struct EmbeddedFile {
    meta: Metadata,
    cursor: Cursor<Bytes>,
    /// Directory children, `None` for files
    children: Option<Vec<Metadata>>,
}

#[async_trait]
impl StoreFile for EmbeddedFile {
    async fn metadata(&mut self) -> io::Result<Metadata> {
        Ok(self.meta.clone())
    }

    async fn read_dir(&mut self) -> io::Result<Vec<Metadata>> {
        self.children.clone().ok_or_else(not_a_directory)
    }
}

impl AsyncRead for EmbeddedFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.meta.is_dir {
            return Poll::Ready(Err(is_a_directory()));
        }
        Pin::new(&mut this.cursor).poll_read(cx, buf)
    }
}

impl AsyncSeek for EmbeddedFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        if this.meta.is_dir {
            return Err(is_a_directory());
        }
        Pin::new(&mut this.cursor).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.get_mut().cursor).poll_complete(cx)
    }
}
