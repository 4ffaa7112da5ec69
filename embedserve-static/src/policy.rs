//! Error policy
//!
//! Every store error raised while serving a request is classified into a
//! [`StoreErrorKind`] and handed to the configured [`ErrorPolicy`], which
//! decides the outcome of the request. Errors are never retried.

use embedserve_core::config::NotFoundMode;
use embedserve_core::server::{HandlerResponse, Outcome};
use std::fmt;
use std::io;
use std::sync::Arc;

/// Category of a store error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    PermissionDenied,
    Other,
}

impl From<io::ErrorKind> for StoreErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => StoreErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => StoreErrorKind::PermissionDenied,
            _ => StoreErrorKind::Other,
        }
    }
}

/// An error raised by a file store while serving `path`
#[derive(Debug)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Store path being served when the error occurred
    pub path: String,
    pub source: io::Error,
}

impl StoreError {
    pub fn new(path: impl Into<String>, source: io::Error) -> Self {
        Self {
            kind: source.kind().into(),
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} serving {}: {}", self.kind, self.path, self.source)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Maps a store error to the outcome of the request
pub type ErrorPolicy = Arc<dyn Fn(&StoreError) -> Outcome + Send + Sync>;

/// The default policy
///
/// Not found passes the request on (or answers 404 with
/// [`NotFoundMode::Status`]), permission denied answers 403 and anything
/// else answers 500.
pub fn default_policy(not_found: NotFoundMode) -> ErrorPolicy {
    Arc::new(move |err: &StoreError| match err.kind {
        StoreErrorKind::NotFound => match not_found {
            NotFoundMode::Next => Outcome::Next,
            NotFoundMode::Status => HandlerResponse::not_found().into(),
        },
        StoreErrorKind::PermissionDenied => HandlerResponse::forbidden().into(),
        StoreErrorKind::Other => {
            tracing::warn!("⚠️ {}", err);
            HandlerResponse::internal_error().into()
        }
    })
}
