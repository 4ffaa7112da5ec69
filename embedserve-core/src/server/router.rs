//! Mount router
//!
//! Handlers are registered under a mount prefix and tried in registration
//! order. A handler that returns [`Outcome::Next`] passes the request on to
//! the next matching mount; when every handler passes, the router answers
//! 404.

use super::handlers::{Handler, HandlerResponse, Outcome, Request};
use std::sync::Arc;

/// A handler registered under a path prefix
#[derive(Clone)]
pub struct Mount {
    /// Normalized prefix: leading `/`, no trailing `/` except for the root
    pub prefix: String,
    pub handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("prefix", &self.prefix)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Ordered prefix router
#[derive(Debug, Clone, Default)]
pub struct Router {
    mounts: Vec<Mount>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `prefix`
    pub fn mount(&mut self, prefix: &str, handler: Arc<dyn Handler>) {
        let prefix = Self::normalize_prefix(prefix);
        tracing::debug!("🔗 Mounting {} at {}", handler.name(), prefix);
        self.mounts.push(Mount { prefix, handler });
    }

    /// Builder-style [`mount`](Self::mount)
    pub fn with(mut self, prefix: &str, handler: Arc<dyn Handler>) -> Self {
        self.mount(prefix, handler);
        self
    }

    /// Mounts whose prefix covers `path`, in registration order
    pub fn match_path(&self, path: &str) -> Vec<&Mount> {
        self.mounts
            .iter()
            .filter(|m| Self::path_matches(path, &m.prefix))
            .collect()
    }

    /// Run the request through every matching handler until one responds
    pub async fn dispatch(&self, req: &Request) -> HandlerResponse {
        for mount in self.match_path(&req.path) {
            match mount.handler.handle(req).await {
                Outcome::Respond(response) => return response,
                Outcome::Next => {
                    tracing::debug!(
                        "⏭️ {} at {} passed on {} {}",
                        mount.handler.name(),
                        mount.prefix,
                        req.method,
                        req.path
                    );
                }
            }
        }

        HandlerResponse::not_found()
    }

    /// Get all mounts
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Normalize a mount prefix: `""`, `"/"` and `"/*"` all mean the root
    pub fn normalize_prefix(prefix: &str) -> String {
        let trimmed = prefix.trim_end_matches('*').trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Prefix match on whole path segments
    fn path_matches(path: &str, prefix: &str) -> bool {
        if prefix == "/" {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
