//! HTTP transport seam for Settee
//!
//! The engine never talks to the network directly. It builds an
//! [`HttpRequest`] and hands it to a [`Transport`], which returns the raw
//! status line, headers and body. Two implementations ship with the crate:
//! - [`UreqTransport`]: blocking client for real servers (feature `ureq-transport`)
//! - [`testing::MemoryCouch`]: in-memory CouchDB for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod request;
pub mod testing;
#[cfg(feature = "ureq-transport")]
pub mod ureq_client;

pub use error::TransportError;
pub use request::{Credentials, Endpoint, HttpRequest, HttpResponse, Method};
#[cfg(feature = "ureq-transport")]
pub use ureq_client::UreqTransport;

use std::sync::Arc;

/// Capability to issue one HTTP request and return its response
///
/// Implementations must not treat status codes >= 400 as errors: those
/// responses carry store error bodies that the engine classifies itself.
/// `Err` is reserved for requests that produced no response at all.
pub trait Transport: Send + Sync {
    /// Send a request and wait for the complete response
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Drop any pooled connections or session state
    fn reset(&self) {}
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }

    fn reset(&self) {
        (**self).reset()
    }
}
