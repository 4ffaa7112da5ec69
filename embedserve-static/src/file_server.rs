//! File server implementation

use crate::listing;
use crate::mime;
use crate::policy::{default_policy, ErrorPolicy, StoreError};
use crate::sniff::{self, SNIFF_LEN};
use crate::store::{DirStore, FileStore, Metadata, StoreFile};
use async_trait::async_trait;
use embedserve_core::config::{HandlerConfig, NotFoundMode};
use embedserve_core::server::{Body, Handler, HandlerResponse, Outcome, Request, Router};
use embedserve_core::{Error, Result};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use http::{HeaderValue, Method, StatusCode};
use percent_encoding::percent_decode_str;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const DEFAULT_INDEX: &str = "/index.html";

/// Serves files from a [`FileStore`] mounted under a path prefix
pub struct StaticFileHandler {
    root: Arc<dyn FileStore>,
    /// Normalized mount prefix, `/` when mounted at the root
    prefix: String,
    /// Index file name, always starting with `/`
    index: String,
    browse: bool,
    error_policy: ErrorPolicy,
}

/// Builder for [`StaticFileHandler`]
pub struct StaticFileHandlerBuilder {
    root: Option<Arc<dyn FileStore>>,
    prefix: String,
    index: String,
    browse: bool,
    not_found: NotFoundMode,
    error_policy: Option<ErrorPolicy>,
}

impl Default for StaticFileHandlerBuilder {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "/".to_string(),
            index: DEFAULT_INDEX.to_string(),
            browse: false,
            not_found: NotFoundMode::Next,
            error_policy: None,
        }
    }
}

impl StaticFileHandlerBuilder {
    /// Store to serve files from (required)
    pub fn root(self, store: impl FileStore + 'static) -> Self {
        self.shared_root(Arc::new(store))
    }

    /// Store to serve files from, shared with other handlers
    pub fn shared_root(mut self, store: Arc<dyn FileStore>) -> Self {
        self.root = Some(store);
        self
    }

    /// Mount prefix stripped from request paths
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Router::normalize_prefix(prefix);
        self
    }

    /// Index file served for directories, default `index.html`
    pub fn index(mut self, index: &str) -> Self {
        self.index = if index.is_empty() {
            DEFAULT_INDEX.to_string()
        } else if index.starts_with('/') {
            index.to_string()
        } else {
            format!("/{}", index)
        };
        self
    }

    /// Enable directory browsing
    pub fn browse(mut self, enable: bool) -> Self {
        self.browse = enable;
        self
    }

    /// Not-found behavior of the default error policy
    pub fn not_found(mut self, mode: NotFoundMode) -> Self {
        self.not_found = mode;
        self
    }

    /// Replace the default error policy
    pub fn error_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&StoreError) -> Outcome + Send + Sync + 'static,
    {
        self.error_policy = Some(Arc::new(policy));
        self
    }

    /// Build the handler; fails without a root store
    pub fn build(self) -> Result<StaticFileHandler> {
        let root = self
            .root
            .ok_or_else(|| Error::Config("file server requires a root store".to_string()))?;

        Ok(StaticFileHandler {
            root,
            prefix: self.prefix,
            index: self.index,
            browse: self.browse,
            error_policy: self
                .error_policy
                .unwrap_or_else(|| default_policy(self.not_found)),
        })
    }
}

impl StaticFileHandler {
    /// Start building a handler
    pub fn builder() -> StaticFileHandlerBuilder {
        StaticFileHandlerBuilder::default()
    }

    /// Handler with default settings serving `store` at the root
    pub fn new(store: impl FileStore + 'static) -> Self {
        Self {
            root: Arc::new(store),
            prefix: "/".to_string(),
            index: DEFAULT_INDEX.to_string(),
            browse: false,
            error_policy: default_policy(NotFoundMode::Next),
        }
    }

    /// Build a directory-backed handler from a `file_server` route
    pub fn from_config(prefix: &str, config: &HandlerConfig) -> Result<Self> {
        match config {
            HandlerConfig::FileServer {
                root,
                index,
                browse,
                not_found,
            } => {
                if root.trim().is_empty() {
                    return Err(Error::Config("file server requires a root store".to_string()));
                }
                let store = DirStore::new(root);
                tracing::debug!("📁 File server at {} serving {}", prefix, store.root().display());
                Self::builder()
                    .root(store)
                    .prefix(prefix)
                    .index(index)
                    .browse(*browse)
                    .not_found(*not_found)
                    .build()
            }
            other => Err(Error::Config(format!(
                "expected a file_server handler, got {:?}",
                other
            ))),
        }
    }

    /// Mount prefix of this handler
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Strip the mount prefix from the raw request path, then decode the rest
    ///
    /// Returns `None` when the path is not under the prefix.
    fn store_path(&self, raw: &str) -> Option<String> {
        let rest = if self.prefix == "/" {
            raw
        } else {
            match raw.strip_prefix(self.prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => return None,
            }
        };
        let decoded = percent_decode_str(rest).decode_utf8_lossy();
        if decoded.starts_with('/') {
            Some(decoded.into_owned())
        } else {
            Some(format!("/{}", decoded))
        }
    }

    /// Open the index file of a directory; any failure keeps the directory
    async fn open_index(&self, path: &str) -> Option<(Box<dyn StoreFile>, Metadata)> {
        let mut index = match self.root.open(path).await {
            Ok(index) => index,
            Err(e) => {
                tracing::trace!("No index at {}: {}", path, e);
                return None;
            }
        };
        match index.metadata().await {
            Ok(meta) => Some((index, meta)),
            Err(e) => {
                tracing::debug!("Ignoring index {}: {}", path, e);
                None
            }
        }
    }

    /// Resolve and serve a request; store errors are left to the policy
    async fn serve(&self, req: &Request) -> std::result::Result<Outcome, StoreError> {
        let Some(mut path) = self.store_path(&req.path) else {
            tracing::debug!("{} is outside {}", req.path, self.prefix);
            return Ok(Outcome::Next);
        };

        tracing::debug!("📁 Serving request: {} -> {}", req.path, path);

        let mut file = self
            .root
            .open(&path)
            .await
            .map_err(|e| StoreError::new(&path, e))?;
        let mut meta = file
            .metadata()
            .await
            .map_err(|e| StoreError::new(&path, e))?;

        if meta.is_dir {
            let index_path = format!("{}{}", path.trim_end_matches('/'), self.index);
            if let Some((index, index_meta)) = self.open_index(&index_path).await {
                file = index;
                meta = index_meta;
                path = index_path;
            }
        }

        if meta.is_dir {
            if !self.browse {
                return Ok(HandlerResponse::forbidden().into());
            }
            let entries = file
                .read_dir()
                .await
                .map_err(|e| StoreError::new(&path, e))?;
            let decoded = percent_decode_str(&req.path).decode_utf8_lossy();
            let html = listing::render(&decoded, entries);
            return Ok(listing_response(html, req.method == Method::HEAD).into());
        }

        let content_type = match mime::from_extension(&meta.name) {
            Some(content_type) => content_type,
            None => sniff_content(&mut file)
                .await
                .map_err(|e| StoreError::new(&path, e))?,
        };

        let mut response = HandlerResponse::status(StatusCode::OK)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Some(modified) = meta.modified_nonzero() {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                response = response.header(LAST_MODIFIED, value);
            }
        }

        match req.method {
            Method::GET => {
                response = response.header(CONTENT_LENGTH, HeaderValue::from(meta.size));
                response.body = Body::Stream {
                    reader: Box::new(file),
                    len: meta.size,
                };
                Ok(response.into())
            }
            Method::HEAD => {
                response = response.header(CONTENT_LENGTH, HeaderValue::from(meta.size));
                file.close().await.map_err(|e| StoreError::new(&path, e))?;
                Ok(response.into())
            }
            _ => Ok(Outcome::Next),
        }
    }
}

/// Read up to [`SNIFF_LEN`] bytes, guess the type and rewind
async fn sniff_content(file: &mut Box<dyn StoreFile>) -> std::io::Result<&'static str> {
    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.seek(SeekFrom::Start(0)).await?;
    Ok(sniff::sniff(&buf[..filled]))
}

fn listing_response(html: String, is_head: bool) -> HandlerResponse {
    let len = html.len() as u64;
    let body = if is_head { Body::Empty } else { Body::from(html) };
    HandlerResponse::with_body(StatusCode::OK, body)
        .header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
        .header(CONTENT_LENGTH, HeaderValue::from(len))
}

#[async_trait]
impl Handler for StaticFileHandler {
    fn name(&self) -> &str {
        "file_server"
    }

    async fn handle(&self, req: &Request) -> Outcome {
        match self.serve(req).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!("File server error: {}", err);
                (self.error_policy)(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EmbeddedStore;
    use crate::policy::StoreErrorKind;

    fn site() -> EmbeddedStore {
        EmbeddedStore::new()
            .with_file("index.html", "<h1>home</h1>")
            .with_file("test.json", r#"{"ok":true}"#)
            .with_file("main.css", "body{}")
            .with_file("docs/index.htm", "<p>docs</p>")
            .with_file("inner/readme", "plain words")
            .with_file("inner/blob", vec![0u8, 1, 2, 3])
    }

    async fn respond(handler: &StaticFileHandler, req: Request) -> HandlerResponse {
        match handler.handle(&req).await {
            Outcome::Respond(response) => response,
            Outcome::Next => panic!("{} {} passed on", req.method, req.path),
        }
    }

    #[test]
    fn test_builder_requires_root() {
        let err = StaticFileHandler::builder().build().err().unwrap();
        assert!(err.to_string().contains("requires a root store"));
    }

    #[test]
    fn test_index_is_normalized() {
        let handler = StaticFileHandler::builder()
            .root(site())
            .index("home.html")
            .build()
            .unwrap();
        assert_eq!(handler.index, "/home.html");

        let handler = StaticFileHandler::builder().root(site()).index("").build().unwrap();
        assert_eq!(handler.index, "/index.html");
    }

    #[test]
    fn test_store_path() {
        let handler = StaticFileHandler::builder()
            .root(site())
            .prefix("/static/")
            .build()
            .unwrap();
        assert_eq!(handler.prefix(), "/static");
        assert_eq!(handler.store_path("/static/app.js").as_deref(), Some("/app.js"));
        assert_eq!(handler.store_path("/static"), Some("/".to_string()));
        assert_eq!(handler.store_path("/static/a%20b.txt").as_deref(), Some("/a b.txt"));
        assert_eq!(handler.store_path("/elsewhere"), None);
        assert_eq!(handler.store_path("/staticfoo/x"), None);
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let handler = StaticFileHandler::new(site());
        let response = respond(&handler, Request::get("/")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[CONTENT_TYPE], "text/html");
        assert_eq!(response.body.collect().await.unwrap(), "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_custom_index() {
        let handler = StaticFileHandler::builder()
            .root(site())
            .index("index.htm")
            .build()
            .unwrap();
        let response = respond(&handler, Request::get("/docs/")).await;
        assert_eq!(response.body.collect().await.unwrap(), "<p>docs</p>");
    }

    #[tokio::test]
    async fn test_sniffed_content_type_and_rewind() {
        let handler = StaticFileHandler::new(site());

        let response = respond(&handler, Request::get("/inner/readme")).await;
        assert_eq!(response.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body.collect().await.unwrap(), "plain words");

        let response = respond(&handler, Request::get("/inner/blob")).await;
        assert_eq!(response.headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(response.body.collect().await.unwrap().as_ref(), &[0u8, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_no_last_modified_without_timestamp() {
        let handler = StaticFileHandler::new(site());
        let response = respond(&handler, Request::get("/main.css")).await;
        assert!(response.headers.get(LAST_MODIFIED).is_none());
    }

    #[tokio::test]
    async fn test_percent_encoded_path() {
        let store = EmbeddedStore::new().with_file("my file.txt", "spaced");
        let handler = StaticFileHandler::new(store);
        let response = respond(&handler, Request::get("/my%20file.txt")).await;
        assert_eq!(response.body.collect().await.unwrap(), "spaced");
    }

    #[tokio::test]
    async fn test_other_methods_pass_on() {
        let handler = StaticFileHandler::new(site());
        let outcome = handler.handle(&Request::new(Method::POST, "/test.json")).await;
        assert!(outcome.is_next());
    }

    #[tokio::test]
    async fn test_custom_error_policy() {
        let handler = StaticFileHandler::builder()
            .root(site())
            .error_policy(|err| {
                assert_eq!(err.kind, StoreErrorKind::NotFound);
                Outcome::status(StatusCode::GONE)
            })
            .build()
            .unwrap();
        let response = respond(&handler, Request::get("/missing")).await;
        assert_eq!(response.status, StatusCode::GONE);
    }

    #[test]
    fn test_from_config() {
        let config = HandlerConfig::FileServer {
            root: "./public".to_string(),
            index: "default.html".to_string(),
            browse: true,
            not_found: NotFoundMode::Status,
        };
        let handler = StaticFileHandler::from_config("/assets", &config).unwrap();
        assert_eq!(handler.prefix(), "/assets");
        assert_eq!(handler.index, "/default.html");
        assert!(handler.browse);

        let respond = HandlerConfig::Respond {
            status: 200,
            body: None,
            headers: Default::default(),
        };
        assert!(StaticFileHandler::from_config("/", &respond).is_err());
    }
}
