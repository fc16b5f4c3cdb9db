//! Document-store engine for Settee
//!
//! This crate turns record-layer operations into CouchDB REST calls:
//! - Configuration: `SourceConfig` loaded from TOML, merged by `ConfigPatch`
//! - Connection: basic, cookie or no authentication, lazy connect
//! - Translation: abstract queries to direct fetch, view or `_all_docs`
//! - Writes: revision-guarded create, update and delete
//! - Pagination: page-numbered reads over per-field views
//! - Query log: bounded record of recent requests
//!
//! [`CouchSource`] ties these together and implements [`DocumentSource`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod document_source;
pub mod paginate;
pub mod query_log;
pub mod source;
pub mod translate;

pub use config::{AuthStrategy, ConfigPatch, RequestConfig, RequestPatch, SourceConfig, CONFIG_FILE_NAME};
pub use connection::{ConnectionManager, Session};
pub use document_source::DocumentSource;
pub use paginate::{build_query, view_name};
pub use query_log::{QueryLog, QueryLogEntry, QueryLogReport};
pub use source::{CouchSource, StoreResponse};
pub use translate::{shape_response, translate, StoreRequest, Target};
