//! File stores
//!
//! A file store is a read-only hierarchical file provider. Paths handed to
//! [`FileStore::open`] are `/`-separated and absolute (`/`, `/css/main.css`).
//! Stores must clean them lexically so `..` can never climb above the root.

mod dir;
mod embedded;

pub use dir::{DirFile, DirStore};
pub use embedded::{EmbeddedFile, EmbeddedStore};

use async_trait::async_trait;
use std::io;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncSeek};

/// Metadata of a store entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Base name of the entry (`""` for the root)
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes, zero for directories
    pub size: u64,
    /// Modification time, `None` when the store has none
    pub modified: Option<SystemTime>,
}

impl Metadata {
    /// Modification time if it is set and not the Unix epoch
    pub fn modified_nonzero(&self) -> Option<SystemTime> {
        self.modified.filter(|t| *t != SystemTime::UNIX_EPOCH)
    }
}

/// An opened store entry
///
/// Reading and seeking go through `AsyncRead`/`AsyncSeek`; reading a
/// directory entry fails. Dropping the handle releases it.
#[async_trait]
pub trait StoreFile: AsyncRead + AsyncSeek + Send + Unpin {
    /// Metadata of this entry
    async fn metadata(&mut self) -> io::Result<Metadata>;

    /// Immediate children of a directory entry, in no particular order
    async fn read_dir(&mut self) -> io::Result<Vec<Metadata>>;

    /// Release the underlying resource and report any error doing so
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A read-only hierarchical file provider
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Open the entry at `path`
    async fn open(&self, path: &str) -> io::Result<Box<dyn StoreFile>>;
}

/// Resolve `path` into its segments, dropping `.` and applying `..`
/// without ever climbing above the root
pub fn clean_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

pub(crate) fn is_a_directory() -> io::Error {
    io::Error::other("is a directory")
}

pub(crate) fn not_a_directory() -> io::Error {
    io::Error::other("not a directory")
}
