//! Embedserve static file handler
//!
//! Serves files from a pluggable [`FileStore`]:
//! - Directory-backed and in-memory (embedded) stores
//! - Index file substitution and optional directory listings
//! - Content type by extension, falling back to content sniffing
//! - Configurable mapping of store errors to responses

mod file_server;
pub mod listing;
pub mod mime;
pub mod policy;
pub mod sniff;
pub mod store;

pub use file_server::{StaticFileHandler, StaticFileHandlerBuilder};
pub use policy::{default_policy, ErrorPolicy, StoreError, StoreErrorKind};
pub use store::{DirStore, EmbeddedStore, FileStore, Metadata, StoreFile};
