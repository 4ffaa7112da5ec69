//! Configuration type definitions
//!
//! These types represent the runtime configuration for Embedserve.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for Embedserve
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbedserveConfig {
    /// Server configurations
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Global logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EmbedserveConfig {
    /// Check the configuration for errors that must stop startup
    pub fn validate(&self) -> Result<()> {
        for (idx, server) in self.servers.iter().enumerate() {
            let label = server.name.clone().unwrap_or_else(|| format!("#{}", idx));
            for route in &server.routes {
                if !route.path.starts_with('/') {
                    return Err(Error::Config(format!(
                        "server {}: route path {:?} must start with '/'",
                        label, route.path
                    )));
                }
                route.handler.validate().map_err(|e| match e {
                    Error::Config(msg) => {
                        Error::Config(format!("server {}, route {}: {}", label, route.path, msg))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Server (virtual host) configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Server name / hostname
    pub name: Option<String>,

    /// Listen addresses
    #[serde(default)]
    pub listen: Vec<String>,

    /// Routes for this server, tried in order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Route configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Mount prefix the handler is registered under
    pub path: String,

    /// Handler for this route
    pub handler: HandlerConfig,
}

/// What a file server does when the requested path does not exist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundMode {
    /// Pass the request on to the next handler
    #[default]
    Next,
    /// Answer with 404 Not Found
    Status,
}

/// Handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerConfig {
    /// Static file server
    FileServer {
        root: String,
        #[serde(default = "default_index")]
        index: String,
        #[serde(default)]
        browse: bool,
        #[serde(default)]
        not_found: NotFoundMode,
    },

    /// Respond with static content
    Respond {
        #[serde(default = "default_status_code")]
        status: u16,
        body: Option<String>,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl HandlerConfig {
    /// Check a single handler configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            HandlerConfig::FileServer { root, .. } => {
                if root.trim().is_empty() {
                    return Err(Error::Config("file_server requires a root".to_string()));
                }
                Ok(())
            }
            HandlerConfig::Respond { status, .. } => {
                if http::StatusCode::from_u16(*status).is_err() {
                    return Err(Error::Config(format!("invalid status code {}", status)));
                }
                Ok(())
            }
        }
    }
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_status_code() -> u16 {
    200
}
