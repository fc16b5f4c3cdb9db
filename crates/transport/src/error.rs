//! Transport errors

use thiserror::Error;

/// A request that produced no HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established (refused, DNS, TLS, ...)
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Response could not be read
    #[error("failed to read response: {0}")]
    Read(String),

    /// Request could not be built (bad header, bad URL)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
