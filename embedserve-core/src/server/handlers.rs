//! Request handlers for Embedserve
//!
//! Provides the request/response model every handler speaks, the
//! [`Handler`] trait and the built-in `respond` handler.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Request as seen by handlers
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request path, still percent-encoded
    pub path: String,
    pub headers: HeaderMap,
}

impl Request {
    /// Create a request without headers
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a HEAD request
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }
}

/// Response body
pub enum Body {
    /// No body
    Empty,
    /// Body held in memory
    Full(Bytes),
    /// Body read from `reader`, exactly `len` bytes long
    Stream {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        len: u64,
    },
}

impl Body {
    /// Declared length of the body
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Full(bytes) => bytes.len() as u64,
            Body::Stream { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole body into memory
    ///
    /// Streams are cut at their declared length; a stream that ends early is
    /// an `UnexpectedEof` error.
    pub async fn collect(self) -> std::io::Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Stream { reader, len } => {
                let mut buf = Vec::with_capacity(len.min(64 * 1024) as usize);
                reader.take(len).read_to_end(&mut buf).await?;
                if (buf.len() as u64) < len {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("body ended after {} of {} bytes", buf.len(), len),
                    ));
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream { len, .. } => f.debug_struct("Stream").field("len", len).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Full(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Full(Bytes::from_static(s.as_bytes()))
    }
}

/// Response from a handler
#[derive(Debug)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl HandlerResponse {
    /// Create a simple response with status code
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// Create a response with body
    pub fn with_body(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Set a header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Plain-text response carrying the status' canonical reason
    pub fn plain(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        Self::with_body(status, reason)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    /// Create not found response
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NOT_FOUND)
    }

    /// Create forbidden response
    pub fn forbidden() -> Self {
        Self::plain(StatusCode::FORBIDDEN)
    }

    /// Create internal server error response
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// What a handler decided to do with a request
#[derive(Debug)]
pub enum Outcome {
    /// Answer the request
    Respond(HandlerResponse),
    /// Pass the request to the next handler
    Next,
}

impl Outcome {
    /// Respond with the plain-text response for `status`
    pub fn status(status: StatusCode) -> Self {
        Outcome::Respond(HandlerResponse::plain(status))
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Outcome::Next)
    }
}

impl From<HandlerResponse> for Outcome {
    fn from(response: HandlerResponse) -> Self {
        Outcome::Respond(response)
    }
}

/// A request handler mounted in a [`Router`](super::Router)
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Handle a request
    async fn handle(&self, req: &Request) -> Outcome;
}

/// Handler answering every request with fixed content
#[derive(Debug, Clone)]
pub struct RespondHandler {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RespondHandler {
    /// Build from the `respond` handler configuration
    pub fn new(status: u16, body: Option<String>, headers: &HashMap<String, String>) -> Result<Self> {
        let status = StatusCode::from_u16(status)
            .map_err(|e| Error::Config(format!("invalid status code {}: {}", status, e)))?;

        let mut map = HeaderMap::new();
        for (k, v) in headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", k, e)))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| Error::Config(format!("invalid header value for {}: {}", k, e)))?;
            map.insert(name, value);
        }

        Ok(Self {
            status,
            headers: map,
            body: body.map(Bytes::from),
        })
    }
}

#[async_trait]
impl Handler for RespondHandler {
    fn name(&self) -> &str {
        "respond"
    }

    async fn handle(&self, req: &Request) -> Outcome {
        let body = match &self.body {
            Some(bytes) if req.method != Method::HEAD => Body::Full(bytes.clone()),
            _ => Body::Empty,
        };

        Outcome::Respond(HandlerResponse {
            status: self.status,
            headers: self.headers.clone(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_respond_handler() {
        let mut headers = HashMap::new();
        headers.insert("X-Custom".to_string(), "value".to_string());
        let handler = RespondHandler::new(200, Some("Hello, World!".to_string()), &headers).unwrap();

        let Outcome::Respond(response) = handler.handle(&Request::get("/")).await else {
            panic!("respond handler passed the request on");
        };
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get("x-custom").unwrap(), "value");
        assert_eq!(response.body.collect().await.unwrap(), "Hello, World!");
    }

    #[tokio::test]
    async fn test_respond_handler_head_has_no_body() {
        let handler = RespondHandler::new(200, Some("body".to_string()), &HashMap::new()).unwrap();

        let Outcome::Respond(response) = handler.handle(&Request::head("/")).await else {
            panic!("respond handler passed the request on");
        };
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_respond_handler_rejects_bad_header() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "v".to_string());
        assert!(RespondHandler::new(200, None, &headers).is_err());
        assert!(RespondHandler::new(1000, None, &HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_stream_body_is_cut_at_declared_length() {
        let body = Body::Stream {
            reader: Box::new(Cursor::new(b"hello world".to_vec())),
            len: 5,
        };
        assert_eq!(body.collect().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_short_stream_is_an_error() {
        let body = Body::Stream {
            reader: Box::new(Cursor::new(b"abc".to_vec())),
            len: 10,
        };
        let err = body.collect().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_plain_responses() {
        let response = HandlerResponse::forbidden();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body.len(), "Forbidden".len() as u64);
        assert!(!Outcome::status(StatusCode::NOT_FOUND).is_next());
    }
}
