//! Embedserve Core Library
//!
//! This crate provides the pieces shared by every Embedserve handler:
//! configuration types and loading, the request/response model, the
//! [`server::Handler`] trait and the mount router that passes requests on
//! to the next handler.

pub mod config;
pub mod error;
pub mod server;

pub use error::{Error, Result};

/// Embedserve version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
