//! Settee - document-store adapter for CouchDB-style HTTP databases
//!
//! Settee maps a record-oriented create/read/update/delete + query protocol
//! onto the CouchDB REST surface, with optimistic concurrency on document
//! revisions.
//!
//! # Quick Start
//!
//! ```ignore
//! use settee::{CouchSource, EntityModel, QueryDescriptor, Record, SourceConfig};
//!
//! let source = CouchSource::with_ureq(SourceConfig::for_database("blog"))?;
//! let post = EntityModel::new("Post");
//!
//! let mut record = Record::new();
//! source.create(&post, &mut record, None)?;
//!
//! let rows = source.read(&post, &QueryDescriptor::all().limit(10))?;
//! ```
//!
//! # Architecture
//!
//! - `settee-core`: record vocabulary, queries, error classification
//! - `settee-transport`: the HTTP seam and an in-memory CouchDB for tests
//! - `settee-engine`: configuration, connection, translation and writes

pub use settee_core::*;
pub use settee_engine::*;
pub use settee_transport::{
    testing, Credentials, Endpoint, HttpRequest, HttpResponse, Method, Transport, TransportError,
};
#[cfg(feature = "ureq-transport")]
pub use settee_transport::UreqTransport;
