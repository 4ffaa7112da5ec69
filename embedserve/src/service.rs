//! Pingora service hosting the handler routers
//!
//! Every request is answered in `request_filter`; nothing is ever proxied
//! upstream.

use async_trait::async_trait;
use bytes::Bytes;
use embedserve_core::config::{HandlerConfig, ServerConfig};
use embedserve_core::server::{Body, Handler, Request, RespondHandler, Router};
use embedserve_static::StaticFileHandler;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::{Error, ErrorType, Result as PingoraResult};
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Size of the chunks streamed bodies are written in
const CHUNK_SIZE: usize = 64 * 1024;

/// Build the router for one server block
pub fn build_router(server: &ServerConfig) -> embedserve_core::Result<Router> {
    let mut router = Router::new();
    for route in &server.routes {
        let handler: Arc<dyn Handler> = match &route.handler {
            HandlerConfig::FileServer { .. } => {
                Arc::new(StaticFileHandler::from_config(&route.path, &route.handler)?)
            }
            HandlerConfig::Respond {
                status,
                body,
                headers,
            } => Arc::new(RespondHandler::new(*status, body.clone(), headers)?),
        };
        router.mount(&route.path, handler);
    }
    Ok(router)
}

/// A named site bound to a listen address
struct Site {
    name: Option<String>,
    router: Router,
}

impl Site {
    /// `None` and `_` match any host
    fn matches(&self, host: &str) -> bool {
        match self.name.as_deref() {
            None | Some("_") => true,
            Some(name) => name.eq_ignore_ascii_case(host),
        }
    }
}

/// Per-request context
pub struct RequestCtx {
    /// Status written to the client
    pub status: Option<u16>,
    pub start_time: std::time::Instant,
}

/// HTTP service for one listen address
#[derive(Clone, Default)]
pub struct EmbedService {
    sites: Arc<Vec<Site>>,
}

impl EmbedService {
    /// Add a server block; host-specific sites win over catch-all ones
    pub fn add_server(&mut self, config: &ServerConfig) -> embedserve_core::Result<()> {
        let router = build_router(config)?;
        let mut sites: Vec<Site> = self
            .sites
            .iter()
            .map(|s| Site {
                name: s.name.clone(),
                router: s.router.clone(),
            })
            .collect();
        sites.push(Site {
            name: config.name.clone(),
            router,
        });
        sites.sort_by_key(|s| matches!(s.name.as_deref(), None | Some("_")));
        self.sites = Arc::new(sites);
        Ok(())
    }

    fn router_for(&self, host: &str) -> Option<&Router> {
        self.sites.iter().find(|s| s.matches(host)).map(|s| &s.router)
    }
}

#[async_trait]
impl ProxyHttp for EmbedService {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx {
            status: None,
            start_time: std::time::Instant::now(),
        }
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> PingoraResult<bool> {
        let req = {
            let header = session.req_header();
            Request {
                method: header.method.clone(),
                path: header.uri.path().to_string(),
                headers: header.headers.clone(),
            }
        };
        let host = req
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .split(':')
            .next()
            .unwrap_or("")
            .to_string();

        let response = match self.router_for(&host) {
            Some(router) => router.dispatch(&req).await,
            None => {
                tracing::debug!("No site for host {:?}", host);
                embedserve_core::server::HandlerResponse::not_found()
            }
        };

        let len = response.body.len();
        let mut header = ResponseHeader::build(response.status, Some(response.headers.len() + 1))?;
        for (name, value) in response.headers.iter() {
            header.append_header(name.clone(), value.clone())?;
        }
        if !header.headers.contains_key(http::header::CONTENT_LENGTH) {
            header.insert_header(http::header::CONTENT_LENGTH, len.to_string())?;
        }
        ctx.status = Some(response.status.as_u16());

        match response.body {
            Body::Empty => {
                session.write_response_header(Box::new(header), true).await?;
            }
            Body::Full(bytes) => {
                session.write_response_header(Box::new(header), false).await?;
                session.write_response_body(Some(bytes), true).await?;
            }
            Body::Stream { reader, len } => {
                session.write_response_header(Box::new(header), false).await?;
                let mut reader = reader.take(len);
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    let n = reader
                        .read(&mut buf)
                        .await
                        .map_err(|e| Error::because(ErrorType::ReadError, "reading response body", e))?;
                    if n == 0 {
                        break;
                    }
                    session
                        .write_response_body(Some(Bytes::copy_from_slice(&buf[..n])), false)
                        .await?;
                }
                session.write_response_body(None, true).await?;
            }
        }

        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> PingoraResult<Box<HttpPeer>>
    where
        Self::CTX: Send + Sync,
    {
        // request_filter answers every request
        Err(Error::new(ErrorType::ConnectNoRoute))
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX)
    where
        Self::CTX: Send + Sync,
    {
        let header = session.req_header();
        let elapsed = ctx.start_time.elapsed();
        match e {
            Some(e) => tracing::warn!(
                method = %header.method,
                path = %header.uri.path(),
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "❌ Request failed"
            ),
            None => tracing::debug!(
                method = %header.method,
                path = %header.uri.path(),
                status = ?ctx.status,
                elapsed_ms = elapsed.as_millis(),
                "✅ Request completed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn server(name: Option<&str>, body: &str) -> ServerConfig {
        ServerConfig {
            name: name.map(String::from),
            listen: vec!["127.0.0.1:8080".to_string()],
            routes: vec![embedserve_core::config::RouteConfig {
                path: "/".to_string(),
                handler: HandlerConfig::Respond {
                    status: 200,
                    body: Some(body.to_string()),
                    headers: HashMap::new(),
                },
            }],
        }
    }

    #[tokio::test]
    async fn test_host_selection() {
        let mut service = EmbedService::default();
        service.add_server(&server(None, "fallback")).unwrap();
        service.add_server(&server(Some("example.com"), "example")).unwrap();

        let req = Request::get("/");
        let router = service.router_for("example.com").unwrap();
        let body = router.dispatch(&req).await.body.collect().await.unwrap();
        assert_eq!(body, "example");

        let router = service.router_for("other.org").unwrap();
        let body = router.dispatch(&req).await.body.collect().await.unwrap();
        assert_eq!(body, "fallback");
    }

    #[test]
    fn test_no_catch_all() {
        let mut service = EmbedService::default();
        service.add_server(&server(Some("example.com"), "x")).unwrap();
        assert!(service.router_for("other.org").is_none());
    }

    #[test]
    fn test_build_router() {
        let mut config = server(None, "hi");
        config.routes.push(embedserve_core::config::RouteConfig {
            path: "/static".to_string(),
            handler: HandlerConfig::FileServer {
                root: ".".to_string(),
                index: "index.html".to_string(),
                browse: false,
                not_found: Default::default(),
            },
        });
        let router = build_router(&config).unwrap();
        assert_eq!(router.len(), 2);
        assert_eq!(router.mounts()[1].prefix, "/static");
    }
}
