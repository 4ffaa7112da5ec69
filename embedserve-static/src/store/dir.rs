//! Store backed by a real directory tree

use super::{clean_segments, is_a_directory, not_a_directory, FileStore, Metadata, StoreFile};
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// Serves files below a directory on disk
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path onto the filesystem, never leaving the root
    ///
    /// A NUL byte cannot name a file, so such paths are not found.
    fn resolve(&self, path: &str) -> io::Result<(PathBuf, String)> {
        let segments = clean_segments(path);
        if segments.iter().any(|s| s.contains('\0')) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "path contains a NUL byte"));
        }
        let name = segments.last().map(|s| s.to_string()).unwrap_or_default();
        let full = segments.iter().fold(self.root.clone(), |acc, s| acc.join(s));
        Ok((full, name))
    }
}

/// Walking through a regular file or passing a name the OS rejects means
/// the entry does not exist
fn not_found(err: io::Error) -> io::Error {
    match err.kind() {
        io::ErrorKind::NotADirectory | io::ErrorKind::InvalidInput => {
            io::Error::new(io::ErrorKind::NotFound, err)
        }
        _ => err,
    }
}

#[async_trait]
impl FileStore for DirStore {
    async fn open(&self, path: &str) -> io::Result<Box<dyn StoreFile>> {
        let (full, name) = self.resolve(path)?;
        let meta = tokio::fs::metadata(&full).await.map_err(not_found)?;

        let file = if meta.is_dir() {
            None
        } else {
            Some(File::open(&full).await.map_err(not_found)?)
        };

        Ok(Box::new(DirFile {
            path: full,
            name,
            is_dir: meta.is_dir(),
            file,
        }))
    }
}

/// An entry opened from a [`DirStore`]
#[derive(Debug)]
pub struct DirFile {
    path: PathBuf,
    name: String,
    is_dir: bool,
    /// `None` for directories and after `close`
    file: Option<File>,
}

impl DirFile {
    fn unreadable(&self) -> io::Error {
        if self.is_dir {
            is_a_directory()
        } else {
            io::Error::other("file is closed")
        }
    }
}

fn to_metadata(name: String, meta: &std::fs::Metadata) -> Metadata {
    Metadata {
        name,
        is_dir: meta.is_dir(),
        size: if meta.is_dir() { 0 } else { meta.len() },
        modified: meta.modified().ok(),
    }
}

#[async_trait]
impl StoreFile for DirFile {
    async fn metadata(&mut self) -> io::Result<Metadata> {
        let meta = match &self.file {
            Some(file) => file.metadata().await?,
            None => tokio::fs::metadata(&self.path).await?,
        };
        Ok(to_metadata(self.name.clone(), &meta))
    }

    async fn read_dir(&mut self) -> io::Result<Vec<Metadata>> {
        if !self.is_dir {
            return Err(not_a_directory());
        }

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follow symlinks; a dangling one is listed as itself.
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(_) => entry.metadata().await?,
            };
            children.push(to_metadata(name, &meta));
        }
        Ok(children)
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            tracing::trace!("Closing {}", self.path.display());
            drop(file);
        }
        Ok(())
    }
}

impl AsyncRead for DirFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(this.unreadable())),
        }
    }
}

impl AsyncSeek for DirFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        match this.file.as_mut() {
            Some(file) => Pin::new(file).start_seek(position),
            None => Err(this.unreadable()),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_complete(cx),
            None => Poll::Ready(Ok(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    fn fixture() -> (tempfile::TempDir, DirStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("a.css"), "body{}").unwrap();
        let store = DirStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_and_read_file() {
        let (_dir, store) = fixture();
        let mut file = store.open("/hello.txt").await.unwrap();

        let meta = file.metadata().await.unwrap();
        assert_eq!(meta.name, "hello.txt");
        assert!(!meta.is_dir);
        assert_eq!(meta.size, 11);
        assert!(meta.modified.is_some());

        let mut head = [0u8; 5];
        file.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"hello");

        file.seek(SeekFrom::Start(0)).await.unwrap();
        let mut all = String::new();
        file.read_to_string(&mut all).await.unwrap();
        assert_eq!(all, "hello world");
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let (_dir, store) = fixture();
        let err = store.open("/nope.txt").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_below_a_file_is_not_found() {
        let (_dir, store) = fixture();
        let err = store.open("/hello.txt/x").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = store.open("/a\0b").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_read_dir() {
        let (_dir, store) = fixture();
        let mut root = store.open("/").await.unwrap();
        assert!(root.metadata().await.unwrap().is_dir);

        let mut names: Vec<_> = root
            .read_dir()
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.name, m.is_dir))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![("hello.txt".to_string(), false), ("sub".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_reading_directory_fails() {
        let (_dir, store) = fixture();
        let mut sub = store.open("/sub").await.unwrap();
        let mut buf = Vec::new();
        assert!(sub.read_to_end(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_dot_dot_stays_inside_root() {
        let (dir, store) = fixture();
        let (resolved, name) = store.resolve("/../../sub/../hello.txt").unwrap();
        assert_eq!(resolved, dir.path().join("hello.txt"));
        assert_eq!(name, "hello.txt");
        assert!(store.open("/../hello.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_read_after_close_fails() {
        let (_dir, store) = fixture();
        let mut file = store.open("/hello.txt").await.unwrap();
        file.close().await.unwrap();
        let mut buf = Vec::new();
        assert!(file.read_to_end(&mut buf).await.is_err());
    }
}
